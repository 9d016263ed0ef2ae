// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Catalog of real unit sizes and the pixel-to-feet mapping
//!
//! Pixel lengths map to nominal foot values through a step function.
//! A region's size key is the sorted foot pair rendered as
//! `"{min}x{max}"`, where the smaller value is printed as-is (`7.6`) and
//! the larger is truncated to whole feet. Keys outside the catalog are
//! remapped through a fallback table.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Upper bound (inclusive) of a pixel band and the feet it maps to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FootBreakpoint {
    pub max_px: u32,
    pub feet: f64,
}

/// Size catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Ascending breakpoints; the first band maps to 0 (too small)
    pub breakpoints: Vec<FootBreakpoint>,
    /// Feet value for lengths beyond the last breakpoint (invalid)
    pub beyond_range_feet: f64,
    /// Valid real unit sizes
    pub valid_sizes: Vec<String>,
    /// Invalid size key -> nearest valid size
    pub fallback: BTreeMap<String, String>,
    /// Type for invalid keys without a fallback entry
    pub default_type: String,
    /// Type for regions with an unmappable dimension
    pub undersized_type: String,
    /// Valid sizes that are commonly two real units fused together
    pub merge_prone: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let bp = |max_px, feet| FootBreakpoint { max_px, feet };
        Self {
            breakpoints: vec![
                bp(55, 0.0),
                bp(95, 5.0),   // 73-77px
                bp(140, 7.6),  // 115-119px, 7'6"
                bp(200, 10.0), // 155-165px
                bp(290, 15.0), // 241-249px
                bp(370, 20.0), // 325-335px
                bp(460, 25.0), // 405-421px
                bp(560, 30.0), // 491-500px
                bp(700, 40.0), // ~650px
            ],
            beyond_range_feet: -1.0,
            valid_sizes: [
                "5x5", "5x10", "5x15", "7.6x10", "10x10", "10x15", "10x20", "10x25", "10x30",
                "10x40",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            fallback: [
                ("5x7", "5x10"),
                ("5x25", "5x15"),
                ("7.6x7", "7.6x10"),
                ("7.6x15", "10x15"),
                ("7.6x20", "10x20"),
                ("15x15", "10x15"),
                ("15x20", "10x20"),
            ]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
            default_type: "10x10".to_string(),
            undersized_type: "5x5".to_string(),
            merge_prone: ["10x20", "10x25", "10x30", "10x40"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Validates pixel sizes against the catalog
#[derive(Debug, Clone)]
pub struct Catalog {
    config: CatalogConfig,
    valid: FxHashSet<String>,
    merge_prone: FxHashSet<String>,
}

impl Catalog {
    pub fn new(config: CatalogConfig) -> Self {
        let valid = config.valid_sizes.iter().cloned().collect();
        let merge_prone = config.merge_prone.iter().cloned().collect();
        Self {
            config,
            valid,
            merge_prone,
        }
    }

    /// Map a pixel length to nominal feet (0 or negative means invalid)
    pub fn px_to_ft(&self, px: u32) -> f64 {
        self.config
            .breakpoints
            .iter()
            .find(|b| px <= b.max_px)
            .map_or(self.config.beyond_range_feet, |b| b.feet)
    }

    /// Size key for a pixel box, or `None` if a dimension is unmappable
    pub fn size_key(&self, w: u32, h: u32) -> Option<String> {
        let a = self.px_to_ft(w);
        let b = self.px_to_ft(h);
        if a <= 0.0 || b <= 0.0 {
            return None;
        }
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Some(format!("{}x{}", lo, hi.trunc()))
    }

    /// Whether the pixel box maps to a real catalog size
    pub fn is_valid(&self, w: u32, h: u32) -> bool {
        self.size_key(w, h)
            .is_some_and(|key| self.valid.contains(&key))
    }

    /// Whether the pixel box maps to a merge-prone catalog size
    pub fn is_merge_prone(&self, w: u32, h: u32) -> bool {
        self.size_key(w, h)
            .is_some_and(|key| self.merge_prone.contains(&key))
    }

    /// Classify a pixel box into a catalog type, falling back when invalid
    pub fn classify(&self, w: u32, h: u32) -> String {
        let Some(key) = self.size_key(w, h) else {
            return self.config.undersized_type.clone();
        };

        if self.valid.contains(&key) {
            return key;
        }

        self.config
            .fallback
            .get(&key)
            .cloned()
            .unwrap_or_else(|| self.config.default_type.clone())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(CatalogConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_px_to_ft_band_edges() {
        let catalog = Catalog::default();
        assert_eq!(catalog.px_to_ft(0), 0.0);
        assert_eq!(catalog.px_to_ft(55), 0.0);
        assert_eq!(catalog.px_to_ft(56), 5.0);
        assert_eq!(catalog.px_to_ft(95), 5.0);
        assert_eq!(catalog.px_to_ft(96), 7.6);
        assert_eq!(catalog.px_to_ft(140), 7.6);
        assert_eq!(catalog.px_to_ft(141), 10.0);
        assert_eq!(catalog.px_to_ft(700), 40.0);
        assert_eq!(catalog.px_to_ft(701), -1.0);
    }

    #[test]
    fn test_px_to_ft_is_monotonic() {
        let catalog = Catalog::default();
        let mut previous = catalog.px_to_ft(0);
        for px in 1..=700 {
            let feet = catalog.px_to_ft(px);
            assert!(feet >= previous, "{}px dropped from {} to {}", px, previous, feet);
            previous = feet;
        }
    }

    #[test]
    fn test_size_keys() {
        let catalog = Catalog::default();
        assert_eq!(catalog.size_key(160, 245).as_deref(), Some("10x15"));
        assert_eq!(catalog.size_key(117, 160).as_deref(), Some("7.6x10"));
        assert_eq!(catalog.size_key(75, 117).as_deref(), Some("5x7"));
        assert_eq!(catalog.size_key(117, 117).as_deref(), Some("7.6x7"));
        assert_eq!(catalog.size_key(40, 160), None);
        assert_eq!(catalog.size_key(160, 800), None);
    }

    #[test]
    fn test_validity_and_merge_prone() {
        let catalog = Catalog::default();
        assert!(catalog.is_valid(75, 75));
        assert!(catalog.is_valid(160, 330));
        assert!(!catalog.is_valid(75, 117));
        assert!(!catalog.is_valid(245, 245));
        assert!(catalog.is_merge_prone(160, 330));
        assert!(catalog.is_merge_prone(495, 160));
        assert!(!catalog.is_merge_prone(160, 245));
        assert!(!catalog.is_merge_prone(75, 150));
    }

    #[test]
    fn test_classify_with_fallbacks() {
        let catalog = Catalog::default();
        assert_eq!(catalog.classify(160, 245), "10x15");
        assert_eq!(catalog.classify(75, 117), "5x10");
        assert_eq!(catalog.classify(245, 245), "10x15");
        assert_eq!(catalog.classify(245, 330), "10x20");
        // Invalid pair without a fallback entry
        assert_eq!(catalog.classify(330, 330), "10x10");
        // Unmappable dimension
        assert_eq!(catalog.classify(30, 160), "5x5");
        assert_eq!(catalog.classify(900, 160), "5x5");
    }

    #[test]
    fn test_classify_is_commutative() {
        let catalog = Catalog::default();
        for w in (0..760).step_by(7) {
            for h in (0..760).step_by(11) {
                assert_eq!(catalog.classify(w, h), catalog.classify(h, w));
            }
        }
    }
}
