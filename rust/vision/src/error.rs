// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for extraction operations
pub type Result<T> = std::result::Result<T, VisionError>;

/// Errors that can occur while extracting a floor plan
#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Cannot load image '{}': {source}", path.display())]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid expected ID range '{0}' (expected START-END)")]
    InvalidRange(String),

    #[error("Text recognition failed: {0}")]
    Recognition(String),
}
