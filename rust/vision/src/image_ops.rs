// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Image processing operations shared by the extraction stages
//!
//! Thin wrappers over `image` / `imageproc` so that every stage speaks the
//! same conventions: binary masks are `GrayImage`s holding 0 or 255, and
//! HSV images use the 8-bit convention of common CV toolkits
//! (H in 0..=179, S and V in 0..=255).

use crate::types::Point2D;
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;

/// HSV image; the three channels hold H, S and V in that order
pub type HsvImage = RgbImage;

/// Convert an RGB image to grayscale
pub fn rgb_to_grayscale(rgb: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(rgb.width(), rgb.height());

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let r = pixel.0[0] as f32;
        let g = pixel.0[1] as f32;
        let b = pixel.0[2] as f32;
        // Standard luminance formula (ITU-R BT.601)
        let luma = (0.299 * r + 0.587 * g + 0.114 * b).round().min(255.0) as u8;
        gray.put_pixel(x, y, Luma([luma]));
    }

    gray
}

/// Convert an RGB image to 8-bit HSV
pub fn rgb_to_hsv(rgb: &RgbImage) -> HsvImage {
    let mut hsv = RgbImage::new(rgb.width(), rgb.height());

    for (x, y, pixel) in rgb.enumerate_pixels() {
        hsv.put_pixel(x, y, Rgb(hsv_pixel(pixel.0)));
    }

    hsv
}

fn hsv_pixel([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };

    let mut h = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    let h = (h / 2.0).round() as u32 % 180;
    [h as u8, s.round() as u8, max as u8]
}

/// Apply Canny edge detection
pub fn canny_edges(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    imageproc::edges::canny(image, low_threshold, high_threshold)
}

/// Morphological dilation with a square element.
///
/// `radius` 1 is a 3x3 element; radius `n` equals `n` iterations of it.
pub fn dilate(image: &GrayImage, radius: u8) -> GrayImage {
    imageproc::morphology::dilate(image, Norm::LInf, radius)
}

/// Morphological erosion with a square element
pub fn erode(image: &GrayImage, radius: u8) -> GrayImage {
    imageproc::morphology::erode(image, Norm::LInf, radius)
}

/// Morphological opening (erode then dilate) - removes small noise
pub fn morphological_open(image: &GrayImage, radius: u8) -> GrayImage {
    let eroded = erode(image, radius);
    dilate(&eroded, radius)
}

/// Keep the foreground of `mask` that is background in `remove`
pub fn subtract(mask: &GrayImage, remove: &GrayImage) -> GrayImage {
    let mut result = mask.clone();
    for (pixel, other) in result.pixels_mut().zip(remove.pixels()) {
        if other.0[0] > 0 {
            pixel.0[0] = 0;
        }
    }
    result
}

/// Invert a grayscale image
pub fn invert(image: &GrayImage) -> GrayImage {
    let mut result = image.clone();
    for pixel in result.pixels_mut() {
        pixel.0[0] = 255 - pixel.0[0];
    }
    result
}

/// Simple threshold - pixels above threshold become white, the rest black
pub fn threshold(image: &GrayImage, threshold_value: u8) -> GrayImage {
    let mut result = GrayImage::new(image.width(), image.height());

    for (x, y, pixel) in image.enumerate_pixels() {
        let value = if pixel.0[0] > threshold_value { 255 } else { 0 };
        result.put_pixel(x, y, Luma([value]));
    }

    result
}

/// Otsu binarization with inverted polarity (dark ink becomes white)
pub fn otsu_threshold_inverted(image: &GrayImage) -> GrayImage {
    let level = imageproc::contrast::otsu_level(image);
    invert(&threshold(image, level))
}

/// Upscale by an integer factor
pub fn upscale(image: &GrayImage, factor: u32, filter: FilterType) -> GrayImage {
    imageops::resize(
        image,
        image.width() * factor,
        image.height() * factor,
        filter,
    )
}

/// Surround an image with a constant border
pub fn pad(image: &GrayImage, border: u32, value: u8) -> GrayImage {
    let mut canvas = GrayImage::from_pixel(
        image.width() + 2 * border,
        image.height() + 2 * border,
        Luma([value]),
    );
    imageops::replace(&mut canvas, image, border as i64, border as i64);
    canvas
}

/// Crop the half-open pixel box `[x0, x1) x [y0, y1)`, clamped to the image.
///
/// Returns `None` when nothing remains after clamping.
pub fn crop_clamped(image: &GrayImage, x0: i64, y0: i64, x1: i64, y1: i64) -> Option<GrayImage> {
    let x0 = x0.max(0);
    let y0 = y0.max(0);
    let x1 = x1.min(image.width() as i64);
    let y1 = y1.min(image.height() as i64);

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(
        imageops::crop_imm(
            image,
            x0 as u32,
            y0 as u32,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
        )
        .to_image(),
    )
}

/// Count foreground pixels of a mask
pub fn count_nonzero(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p.0[0] > 0).count()
}

/// Connected foreground blob described by its outer boundary
#[derive(Debug, Clone)]
pub struct Blob {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    /// Area enclosed by the outer boundary (holes included)
    pub area: f64,
    pub outline: Vec<Point2D>,
}

/// Find the outermost blobs of a binary mask.
///
/// Nested blobs (inside holes of other blobs) are skipped, matching
/// external-only contour retrieval.
pub fn external_blobs(mask: &GrayImage) -> Vec<Blob> {
    find_contours::<u32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter(|c| !c.points.is_empty())
        .map(|c| {
            let mut min_x = u32::MAX;
            let mut min_y = u32::MAX;
            let mut max_x = 0;
            let mut max_y = 0;
            for p in &c.points {
                min_x = min_x.min(p.x);
                min_y = min_y.min(p.y);
                max_x = max_x.max(p.x);
                max_y = max_y.max(p.y);
            }

            let outline: Vec<Point2D> = c
                .points
                .iter()
                .map(|p| Point2D::new(p.x as f64, p.y as f64))
                .collect();

            Blob {
                x: min_x,
                y: min_y,
                w: max_x - min_x + 1,
                h: max_y - min_y + 1,
                area: Point2D::polygon_area(&outline),
                outline,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold() {
        let mut img = GrayImage::new(10, 10);
        for x in 0..10 {
            for y in 0..10 {
                let value = if x < 5 { 100 } else { 200 };
                img.put_pixel(x, y, Luma([value]));
            }
        }

        let result = threshold(&img, 150);

        assert_eq!(result.get_pixel(0, 0).0[0], 0);
        assert_eq!(result.get_pixel(9, 0).0[0], 255);
        // Strictly above: the threshold value itself is background
        assert_eq!(threshold(&img, 200).get_pixel(9, 0).0[0], 0);
    }

    #[test]
    fn test_invert() {
        let mut img = GrayImage::new(2, 2);
        img.put_pixel(0, 0, Luma([0]));
        img.put_pixel(1, 1, Luma([255]));

        let inverted = invert(&img);

        assert_eq!(inverted.get_pixel(0, 0).0[0], 255);
        assert_eq!(inverted.get_pixel(1, 1).0[0], 0);
    }

    #[test]
    fn test_rgb_to_grayscale() {
        let mut rgb = RgbImage::new(2, 1);
        rgb.put_pixel(0, 0, Rgb([255, 255, 255]));
        rgb.put_pixel(1, 0, Rgb([0, 0, 0]));
        let gray = rgb_to_grayscale(&rgb);

        assert_eq!(gray.get_pixel(0, 0).0[0], 255);
        assert_eq!(gray.get_pixel(1, 0).0[0], 0);
    }

    #[test]
    fn test_hsv_conversion() {
        assert_eq!(hsv_pixel([255, 0, 0]), [0, 255, 255]);
        assert_eq!(hsv_pixel([0, 255, 0]), [60, 255, 255]);
        assert_eq!(hsv_pixel([0, 0, 255]), [120, 255, 255]);
        assert_eq!(hsv_pixel([128, 128, 128]), [0, 0, 128]);

        // Unit fill green used by the synthetic plans in the tests
        let [h, s, v] = hsv_pixel([80, 170, 40]);
        assert!((45..=58).contains(&h), "hue {}", h);
        assert!(s >= 100);
        assert_eq!(v, 170);
    }

    #[test]
    fn test_subtract_and_count() {
        let mask = GrayImage::from_pixel(4, 4, Luma([255]));
        let mut remove = GrayImage::new(4, 4);
        remove.put_pixel(0, 0, Luma([255]));
        remove.put_pixel(3, 3, Luma([255]));

        let result = subtract(&mask, &remove);
        assert_eq!(count_nonzero(&result), 14);
    }

    #[test]
    fn test_pad_and_crop() {
        let img = GrayImage::from_pixel(3, 2, Luma([10]));
        let padded = pad(&img, 2, 200);
        assert_eq!(padded.dimensions(), (7, 6));
        assert_eq!(padded.get_pixel(0, 0).0[0], 200);
        assert_eq!(padded.get_pixel(2, 2).0[0], 10);

        let crop = crop_clamped(&padded, -5, -5, 3, 3).unwrap();
        assert_eq!(crop.dimensions(), (3, 3));
        assert!(crop_clamped(&padded, 5, 5, 5, 9).is_none());
        assert!(crop_clamped(&padded, 10, 0, 20, 3).is_none());
    }

    #[test]
    fn test_external_blobs() {
        let mut mask = GrayImage::new(60, 40);
        // Solid block
        for y in 5..15 {
            for x in 5..25 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        // Ring with a blob inside its hole
        for y in 20..38 {
            for x in 30..58 {
                let border = y < 22 || y >= 36 || x < 32 || x >= 56;
                if border {
                    mask.put_pixel(x, y, Luma([255]));
                }
            }
        }
        for y in 27..30 {
            for x in 42..46 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }

        let mut blobs = external_blobs(&mask);
        blobs.sort_by_key(|b| b.x);

        assert_eq!(blobs.len(), 2);
        assert_eq!((blobs[0].x, blobs[0].y, blobs[0].w, blobs[0].h), (5, 5, 20, 10));
        assert!((blobs[0].area - 19.0 * 9.0).abs() < 1e-9);
        assert_eq!((blobs[1].x, blobs[1].y, blobs[1].w, blobs[1].h), (30, 20, 28, 18));
    }
}
