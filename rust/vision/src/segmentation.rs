// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Color segmentation of the site map into binary masks

use crate::image_ops::HsvImage;
use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

/// Inclusive HSV bounds (8-bit convention, H in 0..=179)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColorBand {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl ColorBand {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| self.lower[c] <= hsv[c] && hsv[c] <= self.upper[c])
    }
}

/// Calibrated color bands for the site-map color scheme
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorThresholds {
    /// Green fill of rentable units
    pub unit_fill: ColorBand,
    /// Blue elevator blocks
    pub elevator: ColorBand,
    /// Yellow/orange highlighted areas
    pub highlight: ColorBand,
}

impl Default for ColorThresholds {
    fn default() -> Self {
        Self {
            // Measured fill is H=50-52, S=150-156; widened for anti-aliased edges
            unit_fill: ColorBand::new([45, 100, 40], [58, 255, 230]),
            elevator: ColorBand::new([80, 50, 50], [130, 255, 255]),
            highlight: ColorBand::new([15, 80, 80], [35, 255, 255]),
        }
    }
}

/// Binary mask (255 inside the band, 0 elsewhere)
pub fn in_range(hsv: &HsvImage, band: &ColorBand) -> GrayImage {
    let mut mask = GrayImage::new(hsv.width(), hsv.height());
    for (x, y, pixel) in hsv.enumerate_pixels() {
        if band.contains(pixel.0) {
            mask.put_pixel(x, y, Luma([255]));
        }
    }
    mask
}

/// Mask of unit-colored pixels
pub fn unit_mask(hsv: &HsvImage, thresholds: &ColorThresholds) -> GrayImage {
    in_range(hsv, &thresholds.unit_fill)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_ops::rgb_to_hsv;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_band_bounds_are_inclusive() {
        let band = ColorBand::new([45, 100, 40], [58, 255, 230]);
        assert!(band.contains([45, 100, 40]));
        assert!(band.contains([58, 255, 230]));
        assert!(!band.contains([44, 200, 100]));
        assert!(!band.contains([50, 99, 100]));
        assert!(!band.contains([50, 200, 231]));
    }

    #[test]
    fn test_masks_per_category() {
        let mut rgb = RgbImage::from_pixel(3, 1, Rgb([255, 255, 255]));
        rgb.put_pixel(0, 0, Rgb([80, 170, 40])); // unit green
        rgb.put_pixel(1, 0, Rgb([40, 90, 220])); // elevator blue
        rgb.put_pixel(2, 0, Rgb([240, 200, 40])); // highlight yellow
        let hsv = rgb_to_hsv(&rgb);
        let thresholds = ColorThresholds::default();

        let units = unit_mask(&hsv, &thresholds);
        let elevator = in_range(&hsv, &thresholds.elevator);
        let highlight = in_range(&hsv, &thresholds.highlight);

        assert_eq!(units.get_pixel(0, 0).0[0], 255);
        assert_eq!(units.get_pixel(1, 0).0[0], 0);
        assert_eq!(elevator.get_pixel(1, 0).0[0], 255);
        assert_eq!(elevator.get_pixel(0, 0).0[0], 0);
        assert_eq!(highlight.get_pixel(2, 0).0[0], 255);
        assert_eq!(highlight.get_pixel(0, 0).0[0], 0);
    }
}
