// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boundary separation of touching unit regions
//!
//! Adjacent units share a thin dark boundary that the color mask alone does
//! not separate. Each pass subtracts thickened edges from the unit mask and
//! traces what remains:
//! - weak pass (1 dilation): keeps small units that thicker edges erase
//! - strong pass (2 dilations): cleanly splits medium/large neighbours
//!
//! Neither pass is reliable everywhere, so the image is partitioned into a
//! coarse grid and each cell takes the regions of the pass that found more
//! of them there (ties go to the strong pass).

use crate::image_ops::{canny_edges, dilate, external_blobs, morphological_open, subtract};
use crate::types::{Region, RegionSource};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for boundary separation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationConfig {
    /// Canny edge detection low threshold
    pub canny_low: f32,
    /// Canny edge detection high threshold
    pub canny_high: f32,
    /// Edge dilation iterations of the weak pass
    pub weak_dilation: u8,
    /// Edge dilation iterations of the strong pass
    pub strong_dilation: u8,
    /// Minimum region area for the weak pass (square pixels)
    pub weak_min_area: f64,
    /// Minimum region area for the strong pass (square pixels)
    pub strong_min_area: f64,
    /// Maximum region area (square pixels)
    pub max_area: f64,
    /// Regions more elongated than this are artifacts
    pub max_aspect_ratio: f64,
    /// Minimum width and height (pixels)
    pub min_side: u32,
    /// Grid cell size for merging passes (pixels)
    pub grid_cell_size: u32,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            weak_dilation: 1,
            strong_dilation: 2,
            // Small units shrink to ~55x55 after edge subtraction
            weak_min_area: 1500.0,
            strong_min_area: 1500.0,
            max_area: 600_000.0,
            max_aspect_ratio: 8.0,
            min_side: 15,
            grid_cell_size: 200,
        }
    }
}

/// Result of boundary separation
#[derive(Debug, Clone)]
pub struct SeparationOutput {
    /// Regions of both passes, merged per grid cell
    pub regions: Vec<Region>,
    /// Unit mask severed along weak-pass boundaries, used for wall profiles
    pub separated_mask: GrayImage,
}

/// Detect unit regions with both passes and merge them per grid cell
pub fn separate_regions(
    grayscale: &GrayImage,
    unit_mask: &GrayImage,
    config: &SeparationConfig,
) -> SeparationOutput {
    // Edges are shared between passes
    let edges = canny_edges(grayscale, config.canny_low, config.canny_high);

    let weak = extract_pass(
        unit_mask,
        &edges,
        config.weak_dilation,
        config.weak_min_area,
        RegionSource::WeakPass,
        config,
    );
    let strong = extract_pass(
        unit_mask,
        &edges,
        config.strong_dilation,
        config.strong_min_area,
        RegionSource::StrongPass,
        config,
    );

    tracing::debug!(weak = weak.len(), strong = strong.len(), "boundary passes");

    SeparationOutput {
        regions: merge_passes(weak, strong, config.grid_cell_size),
        separated_mask: separate_mask(unit_mask, &edges, config.weak_dilation),
    }
}

/// Cut the unit mask along thickened edges and remove tiny fragments
pub fn separate_mask(unit_mask: &GrayImage, edges: &GrayImage, dilation: u8) -> GrayImage {
    // Step 1: Thicken edges into separator lines
    let separators = if dilation > 0 {
        dilate(edges, dilation)
    } else {
        edges.clone()
    };

    // Step 2: Cut the unit mask along the separators
    let separated = subtract(unit_mask, &separators);

    // Step 3: Remove tiny fragments
    morphological_open(&separated, 1)
}

/// Run one separation pass with the given edge dilation
pub fn extract_pass(
    unit_mask: &GrayImage,
    edges: &GrayImage,
    dilation: u8,
    min_area: f64,
    source: RegionSource,
    config: &SeparationConfig,
) -> Vec<Region> {
    let cleaned = separate_mask(unit_mask, edges, dilation);

    // Trace outer boundaries and filter implausible shapes
    external_blobs(&cleaned)
        .into_iter()
        .filter(|blob| blob.area >= min_area && blob.area <= config.max_area)
        .filter(|blob| aspect_ratio(blob.w, blob.h) <= config.max_aspect_ratio)
        .filter(|blob| blob.w >= config.min_side && blob.h >= config.min_side)
        .map(|blob| Region::from_outline(blob.x, blob.y, blob.w, blob.h, blob.outline, source))
        .collect()
}

fn aspect_ratio(w: u32, h: u32) -> f64 {
    w.max(h) as f64 / w.min(h).max(1) as f64
}

/// Merge the two passes cell by cell.
///
/// Regions are binned by the grid cell of their top-left corner. A cell
/// keeps the weak pass only if it has strictly more regions there;
/// otherwise the strong pass wins. Output is ordered by cell (row-major).
pub fn merge_passes(weak: Vec<Region>, strong: Vec<Region>, cell_size: u32) -> Vec<Region> {
    let cell_size = cell_size.max(1);
    let mut cells: BTreeMap<(u32, u32), (Vec<Region>, Vec<Region>)> = BTreeMap::new();

    for region in weak {
        let key = (region.y / cell_size, region.x / cell_size);
        cells.entry(key).or_default().0.push(region);
    }
    for region in strong {
        let key = (region.y / cell_size, region.x / cell_size);
        cells.entry(key).or_default().1.push(region);
    }

    let mut merged = Vec::new();
    let mut weak_cells = 0usize;
    for (_, (weak_regions, strong_regions)) in cells {
        if weak_regions.len() > strong_regions.len() {
            weak_cells += 1;
            merged.extend(weak_regions);
        } else {
            merged.extend(strong_regions);
        }
    }

    tracing::trace!(weak_cells, total = merged.len(), "merged boundary passes");
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn region(x: u32, y: u32, source: RegionSource) -> Region {
        Region::new(x, y, 70, 70, source)
    }

    #[test]
    fn test_merge_prefers_strictly_greater_count() {
        // Cell (0,0): weak has 2, strong has 1 -> weak
        // Cell (0,1): weak has 1, strong has 1 -> strong (tie)
        // Cell (1,0): only strong
        let weak = vec![
            region(10, 10, RegionSource::WeakPass),
            region(100, 10, RegionSource::WeakPass),
            region(210, 10, RegionSource::WeakPass),
        ];
        let strong = vec![
            region(12, 12, RegionSource::StrongPass),
            region(212, 12, RegionSource::StrongPass),
            region(20, 220, RegionSource::StrongPass),
        ];

        let merged = merge_passes(weak, strong, 200);
        let picked: Vec<(u32, RegionSource)> = merged.iter().map(|r| (r.x, r.source)).collect();

        assert_eq!(
            picked,
            vec![
                (10, RegionSource::WeakPass),
                (100, RegionSource::WeakPass),
                (212, RegionSource::StrongPass),
                (20, RegionSource::StrongPass),
            ]
        );
    }

    #[test]
    fn test_merge_cell_without_strong_regions() {
        let weak = vec![region(450, 450, RegionSource::WeakPass)];
        let merged = merge_passes(weak, Vec::new(), 200);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source, RegionSource::WeakPass);
    }

    #[test]
    fn test_pass_filters_artifacts() {
        let mut mask = GrayImage::new(400, 200);
        let mut fill = |x0: u32, y0: u32, w: u32, h: u32| {
            for y in y0..y0 + h {
                for x in x0..x0 + w {
                    mask.put_pixel(x, y, Luma([255]));
                }
            }
        };
        fill(10, 10, 80, 80); // unit
        fill(120, 10, 20, 20); // speck, too small
        fill(150, 10, 200, 12); // thin strip, too elongated
        let edges = GrayImage::new(400, 200);

        let regions = extract_pass(
            &mask,
            &edges,
            0,
            1500.0,
            RegionSource::WeakPass,
            &SeparationConfig::default(),
        );

        assert_eq!(regions.len(), 1);
        assert_eq!((regions[0].x, regions[0].y, regions[0].w, regions[0].h), (10, 10, 80, 80));
        assert!(regions[0].outline.is_some());
    }

    #[test]
    fn test_aspect_ratio() {
        assert_eq!(aspect_ratio(80, 10), 8.0);
        assert_eq!(aspect_ratio(0, 10), 10.0);
    }
}
