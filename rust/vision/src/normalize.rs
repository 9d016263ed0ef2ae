// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rescaling of output coordinates to a target width

use crate::types::{Floor, SiteFeature, Unit};

/// Linear rescaling from source pixels to a target coordinate space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateNormalizer {
    scale: f64,
}

impl CoordinateNormalizer {
    /// Map `source_width` pixels onto `target_width`
    pub fn new(source_width: u32, target_width: u32) -> Self {
        let scale = if source_width == 0 {
            1.0
        } else {
            f64::from(target_width) / f64::from(source_width)
        };
        Self { scale }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Scale a coordinate, rounding to the nearest integer
    pub fn apply(&self, value: u32) -> u32 {
        (f64::from(value) * self.scale).round() as u32
    }

    /// Scale the floor height, truncating
    pub fn apply_height(&self, height: u32) -> u32 {
        (f64::from(height) * self.scale).floor() as u32
    }

    pub fn unit(&self, unit: &mut Unit) {
        unit.x = self.apply(unit.x);
        unit.y = self.apply(unit.y);
        unit.w = self.apply(unit.w);
        unit.h = self.apply(unit.h);
    }

    pub fn feature(&self, feature: &mut SiteFeature) {
        feature.x = self.apply(feature.x);
        feature.y = self.apply(feature.y);
        feature.w = self.apply(feature.w);
        feature.h = self.apply(feature.h);
    }
}

/// Rescale every unit and feature of a floor to `target_width`.
///
/// Without a target the floor stays in source pixels.
pub fn normalize_floor(floor: &mut Floor, target_width: Option<u32>) {
    let Some(target_width) = target_width else {
        return;
    };
    if floor.source_image_width == 0 {
        tracing::warn!("cannot normalize a zero-width floor");
        return;
    }

    let normalizer = CoordinateNormalizer::new(floor.source_image_width, target_width);
    for unit in &mut floor.units {
        normalizer.unit(unit);
    }
    for feature in &mut floor.site_features {
        normalizer.feature(feature);
    }

    floor.width = target_width;
    floor.height = normalizer.apply_height(floor.source_image_height);

    tracing::debug!(
        scale = normalizer.scale(),
        width = floor.width,
        height = floor.height,
        "normalized coordinates"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeatureType;
    use approx::assert_relative_eq;

    fn floor(source_width: u32, source_height: u32) -> Floor {
        Floor {
            id: "floor-1".into(),
            name: "Ground Floor".into(),
            width: source_width,
            height: source_height,
            source_image_width: source_width,
            source_image_height: source_height,
            units: vec![Unit {
                id: "101".into(),
                x: 1001,
                y: 2002,
                w: 75,
                h: 149,
                unit_type: "5x10".into(),
                id_original_ocr: None,
            }],
            site_features: vec![SiteFeature {
                feature_type: FeatureType::Elevator,
                x: 40,
                y: 80,
                w: 120,
                h: 60,
                label: None,
            }],
        }
    }

    #[test]
    fn test_normalize_floor() {
        let mut f = floor(4800, 3001);
        normalize_floor(&mut f, Some(1200));

        assert_eq!((f.width, f.height), (1200, 750));
        assert_eq!((f.source_image_width, f.source_image_height), (4800, 3001));
        let u = &f.units[0];
        assert_eq!((u.x, u.y, u.w, u.h), (250, 501, 19, 37));
        let s = &f.site_features[0];
        assert_eq!((s.x, s.y, s.w, s.h), (10, 20, 30, 15));
    }

    #[test]
    fn test_no_target_keeps_pixels() {
        let mut f = floor(4800, 3001);
        let before = f.clone();
        normalize_floor(&mut f, None);
        assert_eq!(f, before);
    }

    #[test]
    fn test_round_trip_within_one_pixel() {
        for (source, target) in [(1000, 1200), (1200, 1200), (1200, 3000), (977, 1000)] {
            let forward = CoordinateNormalizer::new(source, target);
            let back = CoordinateNormalizer::new(target, source);
            for value in 0..=source {
                let restored = back.apply(forward.apply(value));
                assert!(
                    restored.abs_diff(value) <= 1,
                    "{} -> {} -> {} ({}/{})",
                    value,
                    forward.apply(value),
                    restored,
                    source,
                    target
                );
            }
        }
    }

    #[test]
    fn test_scale() {
        assert_relative_eq!(CoordinateNormalizer::new(4800, 1200).scale(), 0.25);
        assert_relative_eq!(CoordinateNormalizer::new(0, 1200).scale(), 1.0);
    }
}
