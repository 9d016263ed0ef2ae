// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Site feature detection (elevators, highlights, office)

use crate::image_ops::{crop_clamped, external_blobs, threshold, HsvImage};
use crate::ocr::{RecognitionOptions, TextRecognizer};
use crate::segmentation::{in_range, ColorBand, ColorThresholds};
use crate::types::{FeatureType, SiteFeature};
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Configuration for site feature detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Minimum area of colored features (square pixels)
    pub min_color_area: f64,
    /// Grayscale level above which a pixel counts as white
    pub office_gray_threshold: u8,
    pub office_min_area: f64,
    pub office_max_area: f64,
    /// Text that marks a white box as the office
    pub office_keyword: String,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            min_color_area: 500.0,
            office_gray_threshold: 240,
            office_min_area: 5000.0,
            office_max_area: 500_000.0,
            office_keyword: "OFFICE".to_string(),
        }
    }
}

/// Locates non-unit features of the site map
pub struct SiteFeatureDetector<'a> {
    recognizer: &'a dyn TextRecognizer,
    colors: &'a ColorThresholds,
    config: &'a FeatureConfig,
}

impl<'a> SiteFeatureDetector<'a> {
    pub fn new(
        recognizer: &'a dyn TextRecognizer,
        colors: &'a ColorThresholds,
        config: &'a FeatureConfig,
    ) -> Self {
        Self {
            recognizer,
            colors,
            config,
        }
    }

    /// Detect elevators, highlights and the office, in that order
    pub fn detect(&self, hsv: &HsvImage, grayscale: &GrayImage) -> Vec<SiteFeature> {
        let mut features = self.colored(hsv, &self.colors.elevator, FeatureType::Elevator);
        features.extend(self.colored(hsv, &self.colors.highlight, FeatureType::Highlight));
        features.extend(self.offices(grayscale));

        tracing::debug!(count = features.len(), "detected site features");
        features
    }

    fn colored(&self, hsv: &HsvImage, band: &ColorBand, feature_type: FeatureType) -> Vec<SiteFeature> {
        external_blobs(&in_range(hsv, band))
            .into_iter()
            .filter(|blob| blob.area >= self.config.min_color_area)
            .map(|blob| SiteFeature {
                feature_type,
                x: blob.x,
                y: blob.y,
                w: blob.w,
                h: blob.h,
                label: None,
            })
            .collect()
    }

    /// White boxes whose text contains the office keyword
    fn offices(&self, grayscale: &GrayImage) -> Vec<SiteFeature> {
        let white = threshold(grayscale, self.config.office_gray_threshold);
        let options = RecognitionOptions::text();
        let keyword = self.config.office_keyword.to_uppercase();

        let mut offices = Vec::new();
        for blob in external_blobs(&white) {
            if blob.area < self.config.office_min_area || blob.area > self.config.office_max_area {
                continue;
            }

            let Some(crop) = crop_clamped(
                grayscale,
                i64::from(blob.x),
                i64::from(blob.y),
                i64::from(blob.x + blob.w),
                i64::from(blob.y + blob.h),
            ) else {
                continue;
            };

            let text = match self.recognizer.recognize(&crop, &options) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(x = blob.x, y = blob.y, error = %e, "office text recognition failed");
                    continue;
                }
            };

            if text.to_uppercase().contains(&keyword) {
                offices.push(SiteFeature {
                    feature_type: FeatureType::Office,
                    x: blob.x,
                    y: blob.y,
                    w: blob.w,
                    h: blob.h,
                    label: Some(keyword.clone()),
                });
            }
        }

        offices
    }
}
