// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Storage unit extraction from color-coded site maps
//!
//! This crate turns a raster site map of a storage facility floor into a
//! structured model of its units:
//! 1. Segmenting unit-colored pixels (HSV bands)
//! 2. Separating touching units along their boundary lines (two passes,
//!    merged per grid cell)
//! 3. Repairing fused regions against the catalog of real unit sizes
//! 4. Rescuing small units the separation missed, then dropping duplicates
//! 5. Reading unit identifiers with a text recognition engine and
//!    correcting systematic misreads
//! 6. Detecting site features (elevators, highlights, office)
//!
//! # Usage
//!
//! ```rust,ignore
//! use storemap_vision::{extract_floor, load_image, ExtractionConfig, RunOptions, TesseractCli};
//!
//! let image = load_image("site-map.png")?;
//! let options = RunOptions {
//!     target_width: Some(1200),
//!     expected_range: Some("400-589".into()),
//!     ..RunOptions::default()
//! };
//! let floor = extract_floor(&image, &ExtractionConfig::default(), &TesseractCli::from_env(), &options);
//! println!("{}", serde_json::to_string_pretty(&floor.to_document())?);
//! ```

pub mod attempts;
pub mod catalog;
pub mod config;
pub mod correction;
pub mod dedup;
pub mod error;
pub mod features;
pub mod identifier;
pub mod image_ops;
pub mod normalize;
pub mod ocr;
pub mod repair;
pub mod rescue;
pub mod segmentation;
pub mod separator;
pub mod types;
pub mod validation;

// Re-export commonly used types and functions
pub use catalog::{Catalog, CatalogConfig};
pub use config::{ExtractionConfig, RunOptions};
pub use correction::{correct_ids, IdRange};
pub use error::{Result, VisionError};
pub use identifier::{pick_best_id, IdentifierReader};
pub use normalize::normalize_floor;
pub use ocr::{EngineMode, RecognitionOptions, TesseractCli, TextRecognizer};
pub use types::{
    FeatureType, Floor, FloorDocument, FloorStats, Region, RegionSource, SiteFeature, Unit,
};
pub use validation::{ExpectedMix, UnitMixReport};

use dedup::deduplicate;
use features::SiteFeatureDetector;
use image::RgbImage;
use image_ops::{rgb_to_grayscale, rgb_to_hsv};
use repair::ShapeRepair;
use rescue::rescue_small_regions;
use segmentation::unit_mask;
use separator::separate_regions;
use std::path::Path;

/// Load a site map image as RGB
pub fn load_image(path: impl AsRef<Path>) -> Result<RgbImage> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|source| VisionError::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image.to_rgb8())
}

/// Detect the units and site features of one floor, in source pixels.
///
/// Units are sorted by numeric ID and their IDs made unique; coordinates
/// are not rescaled (see [`extract_floor`]).
pub fn detect_floor(
    rgb: &RgbImage,
    config: &ExtractionConfig,
    recognizer: &dyn TextRecognizer,
    options: &RunOptions,
) -> Floor {
    let (width, height) = rgb.dimensions();
    let hsv = rgb_to_hsv(rgb);
    let grayscale = rgb_to_grayscale(rgb);
    let catalog = Catalog::new(config.catalog.clone());

    // Step 1: Unit-colored pixels
    let mask = unit_mask(&hsv, &config.colors);

    // Step 2: Separate touching units
    let separation = separate_regions(&grayscale, &mask, &config.separation);
    tracing::info!(count = separation.regions.len(), "detected unit contours");

    // Step 3: Split fused regions
    let repair = ShapeRepair::new(&catalog, &config.repair);
    let regions = repair.split_oversized(separation.regions);
    tracing::info!(count = regions.len(), "regions after oversized split");
    let mut regions =
        repair.split_by_internal_walls(regions, &grayscale, &separation.separated_mask);
    tracing::info!(count = regions.len(), "regions after wall split");

    // Step 4: Rescue missed small units, then drop overlaps
    let rescued = rescue_small_regions(&mask, &regions, &config.rescue);
    if !rescued.is_empty() {
        tracing::info!(count = rescued.len(), "rescued additional small units");
    }
    regions.extend(rescued);
    let regions = deduplicate(regions, &config.dedup);
    tracing::info!(count = regions.len(), "regions after rescue and dedup");

    // Step 5: Read identifiers
    let reader = IdentifierReader::new(recognizer, &config.reader);
    let ids = reader.read_all(&grayscale, &regions);

    let mut units: Vec<Unit> = regions
        .iter()
        .zip(ids)
        .map(|(region, id)| Unit {
            id,
            x: region.x,
            y: region.y,
            w: region.w,
            h: region.h,
            unit_type: catalog.classify(region.w, region.h),
            id_original_ocr: None,
        })
        .collect();
    tracing::info!(
        with_id = units.iter().filter(|u| !u.id.is_empty()).count(),
        total = units.len(),
        "identifier reading complete"
    );

    // Step 6: Correct misreads against the known range
    if let Some(range) = options.expected_range.as_deref() {
        match range.parse::<IdRange>() {
            Ok(range) => {
                correct_ids(&mut units, &range, &config.correction);
            }
            Err(e) => tracing::warn!(error = %e, "skipping identifier correction"),
        }
    }

    // Step 7: Site features
    let site_features = SiteFeatureDetector::new(recognizer, &config.colors, &config.features)
        .detect(&hsv, &grayscale);
    tracing::info!(count = site_features.len(), "detected site features");

    let mut floor = Floor {
        id: options.floor_id.clone(),
        name: options.floor_name.clone(),
        width,
        height,
        source_image_width: width,
        source_image_height: height,
        units,
        site_features,
    };
    floor.sort_units();
    floor.ensure_unique_ids();
    floor
}

/// Full pipeline: detect a floor and rescale it to the requested width
pub fn extract_floor(
    rgb: &RgbImage,
    config: &ExtractionConfig,
    recognizer: &dyn TextRecognizer,
    options: &RunOptions,
) -> Floor {
    let mut floor = detect_floor(rgb, config, recognizer, options);
    normalize_floor(&mut floor, options.target_width);
    floor
}
