// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Near-duplicate suppression
//!
//! Rescued regions can overlap earlier detections when boundaries are
//! imprecise. Two regions are duplicates when their centers are close and
//! their box areas are similar; the larger one survives.

use crate::types::{Point2D, Region};
use serde::{Deserialize, Serialize};

/// Configuration for duplicate suppression
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Centers closer than this are candidates (pixels, exclusive)
    pub max_center_distance: f64,
    /// Smaller over larger box area must reach this (inclusive)
    pub min_area_ratio: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            max_center_distance: 20.0,
            min_area_ratio: 0.7,
        }
    }
}

/// Whether two regions describe the same unit
pub fn is_duplicate(a: &Region, b: &Region, config: &DedupConfig) -> bool {
    let center = |r: &Region| {
        let (x, y) = r.center();
        Point2D::new(x as f64, y as f64)
    };
    if center(a).distance_to(&center(b)) >= config.max_center_distance {
        return false;
    }

    let (area_a, area_b) = (a.box_area(), b.box_area());
    let larger = area_a.max(area_b);
    if larger == 0 {
        return false;
    }
    area_a.min(area_b) as f64 / larger as f64 >= config.min_area_ratio
}

/// Drop near-duplicates, keeping the larger region of each pair.
///
/// Regions are visited largest first (stable for equal areas); survivors
/// keep their input order.
pub fn deduplicate(regions: Vec<Region>, config: &DedupConfig) -> Vec<Region> {
    let mut order: Vec<usize> = (0..regions.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(regions[i].box_area()));

    let mut discarded = vec![false; regions.len()];
    for (pos, &i) in order.iter().enumerate() {
        if discarded[i] {
            continue;
        }
        for &j in &order[pos + 1..] {
            if !discarded[j] && is_duplicate(&regions[i], &regions[j], config) {
                discarded[j] = true;
            }
        }
    }

    let before = regions.len();
    let kept: Vec<Region> = regions
        .into_iter()
        .zip(discarded)
        .filter_map(|(region, dropped)| (!dropped).then_some(region))
        .collect();

    if kept.len() < before {
        tracing::debug!(removed = before - kept.len(), "dropped duplicate regions");
    }

    kept
}
