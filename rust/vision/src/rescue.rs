// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Recovery of small units missed by boundary separation
//!
//! Edge subtraction can erase the smallest units in tight grids. This pass
//! looks at unit-colored pixels that no accepted region covers and recovers
//! single small units or grids of them.

use crate::image_ops::{count_nonzero, crop_clamped, external_blobs, morphological_open, Blob};
use crate::types::{Region, RegionSource};
use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

/// Configuration for the rescue pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RescueConfig {
    /// Accepted regions claim their box shrunk by this margin (pixels)
    pub inset: u32,
    /// Residual components below this area are ignored
    pub min_area: f64,
    /// Side range of a single small unit (inclusive)
    pub unit_min_side: u32,
    pub unit_max_side: u32,
    /// Minimum area of a single small unit
    pub unit_min_area: f64,
    /// Minimum area of a cluster considered for grid decomposition
    pub grid_min_area: f64,
    /// Maximum side of a cluster considered for grid decomposition
    pub grid_max_side: u32,
    /// Nominal small-unit size (pixels)
    pub nominal_cell: u32,
    /// Wall thickness between neighbouring small units (pixels)
    pub wall_px: u32,
    /// Accepted grid cell size range (inclusive)
    pub cell_min: f64,
    pub cell_max: f64,
    /// Grid cells need strictly more than this colored fraction
    pub min_cell_fill: f64,
}

impl Default for RescueConfig {
    fn default() -> Self {
        Self {
            inset: 5,
            min_area: 800.0,
            unit_min_side: 50,
            unit_max_side: 95,
            unit_min_area: 1200.0,
            grid_min_area: 2000.0,
            grid_max_side: 600,
            nominal_cell: 73,
            wall_px: 4,
            cell_min: 50.0,
            cell_max: 100.0,
            min_cell_fill: 0.3,
        }
    }
}

/// Inset box `(x0, y0, x1, y1)` an accepted region claims, if non-empty
fn inset_box(region: &Region, inset: u32) -> Option<(u32, u32, u32, u32)> {
    let x0 = region.x + inset;
    let y0 = region.y + inset;
    let x1 = (region.x + region.w).saturating_sub(inset);
    let y1 = (region.y + region.h).saturating_sub(inset);
    (x1 > x0 && y1 > y0).then_some((x0, y0, x1, y1))
}

/// Find small regions among unit-colored pixels no accepted region claims
pub fn rescue_small_regions(
    unit_mask: &GrayImage,
    accepted: &[Region],
    config: &RescueConfig,
) -> Vec<Region> {
    // Step 1: Coverage of accepted regions, each inset by a margin
    let claimed: Vec<(u32, u32, u32, u32)> = accepted
        .iter()
        .filter_map(|r| inset_box(r, config.inset))
        .collect();

    let mut residual = unit_mask.clone();
    for &(x0, y0, x1, y1) in &claimed {
        let x1 = x1.min(residual.width());
        let y1 = y1.min(residual.height());
        for y in y0..y1 {
            for x in x0..x1 {
                residual.put_pixel(x, y, Luma([0]));
            }
        }
    }

    // Step 2: Clean specks and trace what is left
    let cleaned = morphological_open(&residual, 1);

    let mut rescued = Vec::new();
    for blob in external_blobs(&cleaned) {
        if blob.area < config.min_area {
            continue;
        }

        // Leftover margin of one accepted region, nothing else attached
        if accepted.iter().any(|r| within_margin(&blob, r, config.inset)) {
            tracing::trace!(x = blob.x, y = blob.y, "skipped margin ring");
            continue;
        }

        if is_single_unit(&blob, config) {
            tracing::debug!(x = blob.x, y = blob.y, w = blob.w, h = blob.h, "rescued small unit");
            rescued.push(Region::from_outline(
                blob.x,
                blob.y,
                blob.w,
                blob.h,
                blob.outline,
                RegionSource::Rescue,
            ));
            continue;
        }

        if blob.area >= config.grid_min_area
            && blob.w <= config.grid_max_side
            && blob.h <= config.grid_max_side
        {
            let cells = grid_decompose(&residual, &blob, config);
            if !cells.is_empty() {
                tracing::debug!(
                    x = blob.x,
                    y = blob.y,
                    cells = cells.len(),
                    "rescued small unit grid"
                );
            }
            rescued.extend(cells);
        }
    }

    rescued
}

/// Whether the blob lies inside the region's box grown by `margin`
fn within_margin(blob: &Blob, region: &Region, margin: u32) -> bool {
    blob.x + margin >= region.x
        && blob.y + margin >= region.y
        && blob.x + blob.w <= region.x + region.w + margin
        && blob.y + blob.h <= region.y + region.h + margin
}

fn is_single_unit(blob: &Blob, config: &RescueConfig) -> bool {
    let side = config.unit_min_side..=config.unit_max_side;
    side.contains(&blob.w) && side.contains(&blob.h) && blob.area >= config.unit_min_area
}

/// Split a cluster into a grid of nominal small-unit cells.
///
/// Cell counts are the extent over the nominal pitch (cell plus wall),
/// rounded, at least one. Cells are kept when their colored fraction in
/// `coverage_residual` exceeds the configured minimum.
pub fn grid_decompose(coverage_residual: &GrayImage, blob: &Blob, config: &RescueConfig) -> Vec<Region> {
    let pitch = f64::from(config.nominal_cell + config.wall_px);
    let n_cols = ((f64::from(blob.w) / pitch).round() as u32).max(1);
    let n_rows = ((f64::from(blob.h) / pitch).round() as u32).max(1);

    let cell_w = f64::from(blob.w) / f64::from(n_cols);
    let cell_h = f64::from(blob.h) / f64::from(n_rows);

    let size_range = config.cell_min..=config.cell_max;
    if !size_range.contains(&cell_w) || !size_range.contains(&cell_h) {
        return Vec::new();
    }

    let mut cells = Vec::new();
    for row in 0..n_rows {
        for col in 0..n_cols {
            let cx = (f64::from(blob.x) + f64::from(col) * cell_w) as u32;
            let cy = (f64::from(blob.y) + f64::from(row) * cell_h) as u32;
            let cw = cell_w as u32;
            let ch = cell_h as u32;

            let Some(cell) = crop_clamped(
                coverage_residual,
                i64::from(cx),
                i64::from(cy),
                i64::from(cx + cw),
                i64::from(cy + ch),
            ) else {
                continue;
            };

            let fill = count_nonzero(&cell) as f64 / (cell.width() * cell.height()) as f64;
            if fill > config.min_cell_fill {
                cells.push(Region::new(cx, cy, cw, ch, RegionSource::GridRescue));
            }
        }
    }

    cells
}
