// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Unit identifier reading
//!
//! Each region is cropped and recognized under several preprocessing
//! strategies. Every non-empty digit reading becomes a candidate, and
//! [`pick_best_id`] chooses among them.

use crate::attempts::Attempts;
use crate::image_ops::{crop_clamped, invert, otsu_threshold_inverted, pad, upscale};
use crate::ocr::{EngineMode, RecognitionOptions, TextRecognizer};
use crate::types::Region;
use image::imageops::FilterType;
use image::GrayImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for identifier reading
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Crop inset that avoids neighbouring boundary lines (pixels)
    pub inset: u32,
    /// Upscale factors of the grayscale strategy, in order
    pub primary_scales: Vec<u32>,
    /// Upscale factor of the binarized strategy
    pub fallback_scale: u32,
    /// Border added around upscaled crops (pixels)
    pub border: u32,
    /// Border value of the grayscale strategy (light background)
    pub primary_border_value: u8,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            inset: 2,
            primary_scales: vec![4, 6],
            fallback_scale: 4,
            border: 30,
            primary_border_value: 200,
        }
    }
}

/// Reads unit identifiers with a text recognition engine
pub struct IdentifierReader<'a> {
    recognizer: &'a dyn TextRecognizer,
    config: &'a ReaderConfig,
}

impl<'a> IdentifierReader<'a> {
    pub fn new(recognizer: &'a dyn TextRecognizer, config: &'a ReaderConfig) -> Self {
        Self { recognizer, config }
    }

    /// Read identifiers for all regions, in region order
    pub fn read_all(&self, grayscale: &GrayImage, regions: &[Region]) -> Vec<String> {
        regions
            .par_iter()
            .map(|region| self.read(grayscale, region))
            .collect()
    }

    /// Read the identifier of one region; empty when nothing is legible
    pub fn read(&self, grayscale: &GrayImage, region: &Region) -> String {
        let inset = i64::from(self.config.inset);
        let Some(crop) = crop_clamped(
            grayscale,
            i64::from(region.x) + inset,
            i64::from(region.y) + inset,
            i64::from(region.x + region.w) - inset,
            i64::from(region.y + region.h) - inset,
        ) else {
            return String::new();
        };

        let candidates = self.candidates(&crop);
        pick_best_id(&candidates)
    }

    /// Digit readings of a crop, in strategy order
    pub fn candidates(&self, crop: &GrayImage) -> Vec<String> {
        let mut results = Vec::new();

        // Primary: let the engine binarize the upscaled grayscale itself
        let lstm_digits = RecognitionOptions::digits(EngineMode::Lstm);
        for &scale in &self.config.primary_scales {
            let large = upscale(crop, scale, FilterType::Lanczos3);
            let bordered = pad(&large, self.config.border, self.config.primary_border_value);
            results.extend(self.recognize_digits(&bordered, &lstm_digits));
        }

        // Fallback: Otsu binarization for low-contrast crops
        let binary = otsu_threshold_inverted(crop);
        let large = upscale(&binary, self.config.fallback_scale, FilterType::Nearest);
        let bordered = pad(&large, self.config.border, 0);
        let prepared = invert(&bordered);
        results.extend(self.recognize_digits(
            &prepared,
            &RecognitionOptions::digits(EngineMode::Default),
        ));

        results
    }

    fn recognize_digits(&self, image: &GrayImage, options: &RecognitionOptions) -> Option<String> {
        let text = match self.recognizer.recognize(image, options) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "identifier recognition failed");
                return None;
            }
        };

        let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
        (!digits.is_empty()).then_some(digits)
    }
}

/// Distinct candidates of the given length with their counts, first-seen order
fn counts_of_len(candidates: &[String], len: usize) -> Vec<(&str, usize)> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for candidate in candidates.iter().filter(|c| c.len() == len) {
        match counts.iter_mut().find(|(c, _)| *c == candidate.as_str()) {
            Some((_, count)) => *count += 1,
            None => counts.push((candidate.as_str(), 1)),
        }
    }
    counts
}

/// Most frequent candidate of the given length; the first seen wins ties
fn most_frequent(candidates: &[String], len: usize) -> Option<(&str, usize)> {
    counts_of_len(candidates, len)
        .into_iter()
        .fold(None, |best, (c, n)| match best {
            Some((_, best_n)) if best_n >= n => best,
            _ => Some((c, n)),
        })
}

/// Choose the most plausible identifier among recognition candidates.
///
/// Most identifiers have three digits, so the most frequent 3-digit reading
/// wins; when no 3-digit reading repeats and the first reading is 3 digits,
/// the first reading wins. Otherwise the most frequent 2-digit reading, then
/// the first candidate, then the empty string.
pub fn pick_best_id(candidates: &[String]) -> String {
    Attempts::new()
        .then("three_digit", || {
            most_frequent(candidates, 3).map(|(best, count)| {
                match candidates.first() {
                    Some(first) if count == 1 && first.len() == 3 => first.clone(),
                    _ => best.to_string(),
                }
            })
        })
        .then("two_digit", || {
            most_frequent(candidates, 2).map(|(best, _)| best.to_string())
        })
        .then("first", || candidates.first().cloned())
        .first()
        .unwrap_or_default()
}
