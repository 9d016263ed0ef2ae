// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shape repair for fused or oversized regions
//!
//! Two corrections run in sequence:
//! 1. Oversized split: a catalog-invalid region is divided evenly along its
//!    longer axis into 2 (then 3) parts when every part is catalog-valid.
//! 2. Internal-wall split: merge-prone or large invalid regions are cut at
//!    a detected wall, found either as a dip in the unit-color density or
//!    as a dark line in brightness.

use crate::attempts::Attempts;
use crate::catalog::Catalog;
use crate::types::{Region, RegionSource};
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Configuration for shape repair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Part counts tried for oversized regions, in order
    pub split_parts: Vec<u32>,
    /// Invalid regions need at least this long side for a wall search
    pub wall_min_long_side: u32,
    /// Fraction of the profile searched by the density strategy
    pub density_window: (f64, f64),
    /// Minimum average colored fraction inside the density window
    pub min_fill_fraction: f64,
    /// A wall must be at most this fraction of the average density
    pub density_dip_ratio: f64,
    /// Fraction of the profile searched by the brightness strategy
    pub brightness_window: (f64, f64),
    /// A wall must be at most this fraction of the mean brightness
    pub brightness_dip_ratio: f64,
    /// Minimum extent of each part of a wall split (pixels)
    pub min_part_px: u32,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            split_parts: vec![2, 3],
            wall_min_long_side: 200,
            density_window: (0.15, 0.85),
            min_fill_fraction: 0.3,
            density_dip_ratio: 0.7,
            brightness_window: (0.2, 0.8),
            brightness_dip_ratio: 0.8,
            min_part_px: 30,
        }
    }
}

/// Direction of a cut through a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Vertical cut; profiles run over columns
    Vertical,
    /// Horizontal cut; profiles run over rows
    Horizontal,
}

impl Axis {
    /// Primary and secondary cut directions for a region
    fn order(region: &Region) -> [Axis; 2] {
        if region.w >= region.h {
            [Axis::Vertical, Axis::Horizontal]
        } else {
            [Axis::Horizontal, Axis::Vertical]
        }
    }
}

/// Splits fused regions into catalog-valid parts
pub struct ShapeRepair<'a> {
    catalog: &'a Catalog,
    config: &'a RepairConfig,
}

impl<'a> ShapeRepair<'a> {
    pub fn new(catalog: &'a Catalog, config: &'a RepairConfig) -> Self {
        Self { catalog, config }
    }

    /// Replace catalog-invalid regions with even splits where possible
    pub fn split_oversized(&self, regions: Vec<Region>) -> Vec<Region> {
        let mut result = Vec::with_capacity(regions.len());
        let mut split_count = 0;

        for region in regions {
            if self.catalog.is_valid(region.w, region.h) {
                result.push(region);
                continue;
            }

            let parts = self
                .config
                .split_parts
                .iter()
                .find_map(|&n| self.try_split(&region, n));

            match parts {
                Some(parts) => {
                    tracing::debug!(
                        x = region.x,
                        y = region.y,
                        w = region.w,
                        h = region.h,
                        parts = parts.len(),
                        "split oversized region"
                    );
                    split_count += 1;
                    result.extend(parts);
                }
                None => {
                    // Might be an unusual but real unit
                    tracing::debug!(
                        x = region.x,
                        y = region.y,
                        w = region.w,
                        h = region.h,
                        "kept unsplittable region with unusual size"
                    );
                    result.push(region);
                }
            }
        }

        if split_count > 0 {
            tracing::info!(split_count, "split oversized regions into valid units");
        }

        result
    }

    /// Divide a region evenly into `n_parts` along its longer axis.
    ///
    /// Remainder pixels go to the first parts, so the parts tile the
    /// original box exactly. Returns `None` unless every part is valid.
    pub fn try_split(&self, region: &Region, n_parts: u32) -> Option<Vec<Region>> {
        if n_parts == 0 {
            return None;
        }

        let along_width = region.w >= region.h;
        let extent = if along_width { region.w } else { region.h };
        let base = extent / n_parts;
        let remainder = extent - base * n_parts;

        let mut parts = Vec::with_capacity(n_parts as usize);
        let mut offset = 0;
        for i in 0..n_parts {
            let size = base + u32::from(i < remainder);
            let part = if along_width {
                Region::new(region.x + offset, region.y, size, region.h, RegionSource::OversizeSplit)
            } else {
                Region::new(region.x, region.y + offset, region.w, size, RegionSource::OversizeSplit)
            };
            parts.push(part);
            offset += size;
        }

        parts
            .iter()
            .all(|p| self.catalog.is_valid(p.w, p.h))
            .then_some(parts)
    }

    /// Split merge-prone regions at a visible internal wall
    pub fn split_by_internal_walls(
        &self,
        regions: Vec<Region>,
        grayscale: &GrayImage,
        unit_mask: &GrayImage,
    ) -> Vec<Region> {
        let mut result = Vec::with_capacity(regions.len());
        let mut split_count = 0;

        for region in regions {
            if !self.should_try_wall_split(&region) {
                result.push(region);
                continue;
            }

            match self.find_internal_wall(&region, grayscale, unit_mask) {
                Some(parts) => {
                    split_count += 1;
                    result.extend(parts);
                }
                None => result.push(region),
            }
        }

        if split_count > 0 {
            tracing::info!(split_count, "wall-split merged regions");
        }

        result
    }

    fn should_try_wall_split(&self, region: &Region) -> bool {
        if self.catalog.is_merge_prone(region.w, region.h) {
            return true;
        }
        !self.catalog.is_valid(region.w, region.h)
            && region.long_side() >= self.config.wall_min_long_side
    }

    /// Find a wall through the region and split there.
    ///
    /// Strategies in order: density dip on the primary then secondary axis,
    /// then brightness dip on the primary then secondary axis.
    pub fn find_internal_wall(
        &self,
        region: &Region,
        grayscale: &GrayImage,
        unit_mask: &GrayImage,
    ) -> Option<Vec<Region>> {
        let [primary, secondary] = Axis::order(region);

        let outcome = Attempts::new()
            .then("density_primary", || {
                self.density_split(region, unit_mask, primary)
            })
            .then("density_secondary", || {
                self.density_split(region, unit_mask, secondary)
            })
            .then("brightness_primary", || {
                self.brightness_split(region, grayscale, primary)
            })
            .then("brightness_secondary", || {
                self.brightness_split(region, grayscale, secondary)
            })
            .run();

        let (strategy, parts) = outcome?;
        tracing::debug!(
            x = region.x,
            y = region.y,
            w = region.w,
            h = region.h,
            strategy,
            "split region at internal wall"
        );
        Some(parts)
    }

    fn density_split(&self, region: &Region, mask: &GrayImage, axis: Axis) -> Option<Vec<Region>> {
        let (profile, cross) = profile(mask, region, axis, |v| f64::from(u8::from(v > 0)))?;
        let cross = cross as f64;

        let n = profile.len();
        let (lo, hi) = self.config.density_window;
        let start = (n as f64 * lo) as usize;
        let end = (n as f64 * hi) as usize;
        if end <= start + 4 {
            return None;
        }

        let window = &profile[start..end];
        if window.iter().all(|&v| v == 0.0) {
            return None;
        }

        let min_idx = start + argmin(window);
        let min_fraction = profile[min_idx] / cross;
        let avg_fraction = mean(window) / cross;

        if avg_fraction < self.config.min_fill_fraction {
            return None;
        }
        if min_fraction > avg_fraction * self.config.density_dip_ratio {
            return None;
        }

        self.split_at(region, axis, min_idx as u32)
    }

    fn brightness_split(
        &self,
        region: &Region,
        grayscale: &GrayImage,
        axis: Axis,
    ) -> Option<Vec<Region>> {
        let (sums, cross) = profile(grayscale, region, axis, f64::from)?;
        let profile: Vec<f64> = sums.iter().map(|s| s / cross as f64).collect();

        let n = profile.len();
        let (lo, hi) = self.config.brightness_window;
        let start = (n as f64 * lo) as usize;
        let end = (n as f64 * hi) as usize;
        if end <= start {
            return None;
        }

        let min_idx = start + argmin(&profile[start..end]);
        if profile[min_idx] > mean(&profile) * self.config.brightness_dip_ratio {
            return None;
        }

        self.split_at(region, axis, min_idx as u32)
    }

    /// Cut a region in two at `offset`; both parts must be large and valid
    fn split_at(&self, region: &Region, axis: Axis, offset: u32) -> Option<Vec<Region>> {
        let extent = match axis {
            Axis::Vertical => region.w,
            Axis::Horizontal => region.h,
        };
        if offset >= extent {
            return None;
        }
        let (first, second) = (offset, extent - offset);
        if first < self.config.min_part_px || second < self.config.min_part_px {
            return None;
        }

        let parts = match axis {
            Axis::Vertical => [
                Region::new(region.x, region.y, first, region.h, RegionSource::WallSplit),
                Region::new(region.x + first, region.y, second, region.h, RegionSource::WallSplit),
            ],
            Axis::Horizontal => [
                Region::new(region.x, region.y, region.w, first, RegionSource::WallSplit),
                Region::new(region.x, region.y + first, region.w, second, RegionSource::WallSplit),
            ],
        };

        parts
            .iter()
            .all(|p| self.catalog.is_valid(p.w, p.h))
            .then(|| parts.to_vec())
    }
}

/// Sum `value(pixel)` along each column (vertical) or row (horizontal) of
/// the region, clamped to the image. Returns the sums and the number of
/// pixels summed per entry.
fn profile(
    image: &GrayImage,
    region: &Region,
    axis: Axis,
    value: impl Fn(u8) -> f64,
) -> Option<(Vec<f64>, u32)> {
    let x1 = (region.x + region.w).min(image.width());
    let y1 = (region.y + region.h).min(image.height());
    if x1 <= region.x || y1 <= region.y {
        return None;
    }
    let (cols, rows) = (x1 - region.x, y1 - region.y);

    let (len, cross) = match axis {
        Axis::Vertical => (cols, rows),
        Axis::Horizontal => (rows, cols),
    };
    let mut sums = vec![0.0; len as usize];

    for dy in 0..rows {
        for dx in 0..cols {
            let v = value(image.get_pixel(region.x + dx, region.y + dy).0[0]);
            let idx = match axis {
                Axis::Vertical => dx,
                Axis::Horizontal => dy,
            };
            sums[idx as usize] += v;
        }
    }

    Some((sums, cross))
}

/// Index of the first minimum
fn argmin(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |(best, min), (i, &v)| {
            if v < min {
                (i, v)
            } else {
                (best, min)
            }
        })
        .0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn repair_fixture() -> (Catalog, RepairConfig) {
        (Catalog::default(), RepairConfig::default())
    }

    fn fill(image: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, value: u8) {
        for y in y0..y1 {
            for x in x0..x1 {
                image.put_pixel(x, y, Luma([value]));
            }
        }
    }

    #[test]
    fn test_oversize_split_tiles_region() {
        let (catalog, config) = repair_fixture();
        let repair = ShapeRepair::new(&catalog, &config);

        // 15x15 is invalid; halves are 7.6x15 (invalid), thirds are 5x15
        let region = Region::new(40, 60, 245, 245, RegionSource::StrongPass);
        let parts = repair.split_oversized(vec![region.clone()]);

        assert_eq!(parts.len(), 3);
        let widths: Vec<u32> = parts.iter().map(|p| p.w).collect();
        assert_eq!(widths, vec![82, 82, 81]);

        let mut x = region.x;
        for part in &parts {
            assert_eq!(part.x, x);
            assert_eq!((part.y, part.h), (region.y, region.h));
            assert_eq!(part.source, RegionSource::OversizeSplit);
            x += part.w;
        }
        assert_eq!(x, region.x + region.w);

        let total: u64 = parts.iter().map(Region::box_area).sum();
        assert_eq!(total, region.box_area());
    }

    #[test]
    fn test_oversize_split_prefers_two_parts() {
        let (catalog, config) = repair_fixture();
        let repair = ShapeRepair::new(&catalog, &config);

        // 5x20 is not in the catalog; two 5x10 halves are
        let parts = repair.split_oversized(vec![Region::new(0, 0, 75, 330, RegionSource::WeakPass)]);
        assert_eq!(parts.len(), 2);
        assert_eq!((parts[0].y, parts[0].h), (0, 165));
        assert_eq!((parts[1].y, parts[1].h), (165, 165));
    }

    #[test]
    fn test_valid_and_unsplittable_regions_kept() {
        let (catalog, config) = repair_fixture();
        let repair = ShapeRepair::new(&catalog, &config);

        let valid = Region::new(0, 0, 160, 245, RegionSource::StrongPass);
        let huge = Region::new(0, 0, 900, 900, RegionSource::StrongPass);
        let result = repair.split_oversized(vec![valid.clone(), huge.clone()]);

        assert_eq!(result, vec![valid, huge]);
    }

    #[test]
    fn test_wall_split_by_density_gap() {
        let (catalog, config) = repair_fixture();
        let repair = ShapeRepair::new(&catalog, &config);

        // 10x20 region with an uncolored 4-row wall
        let mut mask = GrayImage::new(200, 400);
        fill(&mut mask, 0, 0, 160, 330, 255);
        fill(&mut mask, 0, 163, 160, 167, 0);
        let gray = GrayImage::from_pixel(200, 400, Luma([128]));

        let region = Region::new(0, 0, 160, 330, RegionSource::StrongPass);
        let parts = repair.split_by_internal_walls(vec![region], &gray, &mask);

        assert_eq!(parts.len(), 2);
        assert_eq!((parts[0].x, parts[0].y, parts[0].w, parts[0].h), (0, 0, 160, 163));
        assert_eq!((parts[1].x, parts[1].y, parts[1].w, parts[1].h), (0, 163, 160, 167));
        assert!(parts.iter().all(|p| p.source == RegionSource::WallSplit));
    }

    #[test]
    fn test_wall_split_by_brightness_dip() {
        let (catalog, config) = repair_fixture();
        let repair = ShapeRepair::new(&catalog, &config);

        // Fully colored mask, wall visible only as a dark column band
        let mask = GrayImage::from_pixel(330, 160, Luma([255]));
        let mut gray = GrayImage::from_pixel(330, 160, Luma([128]));
        fill(&mut gray, 165, 0, 169, 160, 20);

        let region = Region::new(0, 0, 330, 160, RegionSource::StrongPass);
        let parts = repair
            .find_internal_wall(&region, &gray, &mask)
            .expect("wall should be found");

        assert_eq!(parts.len(), 2);
        assert_eq!((parts[0].x, parts[0].w), (0, 165));
        assert_eq!((parts[1].x, parts[1].w), (165, 165));
    }

    #[test]
    fn test_sparse_mask_gap_not_a_wall() {
        let (catalog, config) = repair_fixture();
        let repair = ShapeRepair::new(&catalog, &config);

        // Only a quarter of each row is colored, so the gap is not trusted
        let mut mask = GrayImage::new(160, 330);
        fill(&mut mask, 0, 0, 40, 330, 255);
        fill(&mut mask, 0, 163, 40, 167, 0);
        let gray = GrayImage::from_pixel(160, 330, Luma([128]));

        let region = Region::new(0, 0, 160, 330, RegionSource::StrongPass);
        assert!(repair.find_internal_wall(&region, &gray, &mask).is_none());
    }

    #[test]
    fn test_shallow_density_dip_not_a_wall() {
        let (catalog, config) = repair_fixture();
        let repair = ShapeRepair::new(&catalog, &config);

        // Wall rows still 80% colored: above 0.7 of the average
        let mut mask = GrayImage::from_pixel(160, 330, Luma([255]));
        fill(&mut mask, 128, 163, 160, 167, 0);
        let gray = GrayImage::from_pixel(160, 330, Luma([128]));

        let region = Region::new(0, 0, 160, 330, RegionSource::StrongPass);
        assert!(repair.find_internal_wall(&region, &gray, &mask).is_none());
    }

    #[test]
    fn test_faint_brightness_dip_not_a_wall() {
        let (catalog, config) = repair_fixture();
        let repair = ShapeRepair::new(&catalog, &config);
        let mask = GrayImage::new(160, 330);
        let region = Region::new(0, 0, 160, 330, RegionSource::StrongPass);

        // Dip to 0.85 of the background stays above 0.8 of the mean
        let mut gray = GrayImage::from_pixel(160, 330, Luma([200]));
        fill(&mut gray, 0, 163, 160, 167, 170);
        assert!(repair.find_internal_wall(&region, &gray, &mask).is_none());

        // A dip to 0.75 is a wall
        fill(&mut gray, 0, 163, 160, 167, 150);
        let parts = repair
            .find_internal_wall(&region, &gray, &mask)
            .expect("wall should be found");
        assert_eq!((parts[0].h, parts[1].h), (163, 167));
    }

    #[test]
    fn test_non_merge_prone_region_not_wall_split() {
        let (catalog, config) = repair_fixture();
        let repair = ShapeRepair::new(&catalog, &config);

        // 10x15 is valid and not merge-prone: the wall is ignored
        let mut mask = GrayImage::new(160, 245);
        fill(&mut mask, 0, 0, 160, 245, 255);
        fill(&mut mask, 0, 120, 160, 124, 0);
        let gray = GrayImage::from_pixel(160, 245, Luma([128]));

        let region = Region::new(0, 0, 160, 245, RegionSource::StrongPass);
        let result = repair.split_by_internal_walls(vec![region.clone()], &gray, &mask);
        assert_eq!(result, vec![region]);
    }

    #[test]
    fn test_wall_split_rejects_short_parts() {
        let (catalog, config) = repair_fixture();
        let repair = ShapeRepair::new(&catalog, &config);
        let region = Region::new(0, 0, 160, 330, RegionSource::StrongPass);

        assert!(repair.split_at(&region, Axis::Horizontal, 20).is_none());
        assert!(repair.split_at(&region, Axis::Horizontal, 330).is_none());
        assert!(repair.split_at(&region, Axis::Horizontal, 165).is_some());
    }

    #[test]
    fn test_argmin_takes_first_minimum() {
        assert_eq!(argmin(&[3.0, 1.0, 2.0, 1.0]), 1);
        assert_eq!(argmin(&[]), 0);
    }
}
