// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Extraction configuration
//!
//! All calibrated constants live here and are passed into the stages.
//! Every section defaults to the values calibrated for the reference site
//! maps, so a JSON file only needs the fields it changes.

use crate::catalog::CatalogConfig;
use crate::correction::CorrectionConfig;
use crate::dedup::DedupConfig;
use crate::error::Result;
use crate::features::FeatureConfig;
use crate::identifier::ReaderConfig;
use crate::repair::RepairConfig;
use crate::rescue::RescueConfig;
use crate::segmentation::ColorThresholds;
use crate::separator::SeparationConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration of the whole extraction pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub colors: ColorThresholds,
    pub separation: SeparationConfig,
    pub catalog: CatalogConfig,
    pub repair: RepairConfig,
    pub rescue: RescueConfig,
    pub dedup: DedupConfig,
    pub reader: ReaderConfig,
    pub correction: CorrectionConfig,
    pub features: FeatureConfig,
}

impl ExtractionConfig {
    /// Load a (possibly partial) configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Per-run options describing the floor being extracted
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub floor_id: String,
    pub floor_name: String,
    /// Rescale output coordinates to this width
    pub target_width: Option<u32>,
    /// Valid identifier range as `"start-end"`, enables correction
    pub expected_range: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            floor_id: "floor-1".to_string(),
            floor_name: "Ground Floor".to_string(),
            target_width: None,
            expected_range: None,
        }
    }
}
