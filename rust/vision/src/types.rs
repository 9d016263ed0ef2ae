// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core types for storage unit extraction

use serde::{Deserialize, Serialize};

/// A 2D point (simplified for serialization)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point2D) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Calculate polygon area using shoelace formula
    pub fn polygon_area(points: &[Point2D]) -> f64 {
        let n = points.len();
        if n < 3 {
            return 0.0;
        }

        let mut area = 0.0;
        for i in 0..n {
            let j = (i + 1) % n;
            area += points[i].x * points[j].y;
            area -= points[j].x * points[i].y;
        }

        (area / 2.0).abs()
    }
}

/// Which stage produced a region
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RegionSource {
    /// Boundary separation with one edge-dilation iteration
    WeakPass,
    /// Boundary separation with two edge-dilation iterations
    StrongPass,
    /// Even division of a catalog-invalid region
    OversizeSplit,
    /// Division at a detected internal wall
    WallSplit,
    /// Uncovered small region found by the rescue pass
    Rescue,
    /// Cell of a grid-decomposed rescue cluster
    GridRescue,
}

/// Candidate rectangular unit area, before an identifier is assigned
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    /// Area in square pixels (outline area when an outline is known)
    pub area: f64,
    /// Boundary the region was traced from, if any
    pub outline: Option<Vec<Point2D>>,
    pub source: RegionSource,
}

impl Region {
    /// Region covering a plain box; area is `w * h`
    pub fn new(x: u32, y: u32, w: u32, h: u32, source: RegionSource) -> Self {
        Self {
            x,
            y,
            w,
            h,
            area: (w as f64) * (h as f64),
            outline: None,
            source,
        }
    }

    /// Region traced from a boundary outline
    pub fn from_outline(
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        outline: Vec<Point2D>,
        source: RegionSource,
    ) -> Self {
        Self {
            x,
            y,
            w,
            h,
            area: Point2D::polygon_area(&outline),
            outline: Some(outline),
            source,
        }
    }

    /// Bounding box area
    pub fn box_area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    /// Integer center of the bounding box
    pub fn center(&self) -> (i64, i64) {
        (
            self.x as i64 + self.w as i64 / 2,
            self.y as i64 + self.h as i64 / 2,
        )
    }

    pub fn long_side(&self) -> u32 {
        self.w.max(self.h)
    }
}

/// Finalized storage unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Unit {
    /// Recognized identifier; empty when nothing was read
    pub id: String,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    /// Nominal size category, e.g. "10x15"
    #[serde(rename = "type")]
    pub unit_type: String,
    /// Reading before confusion correction, present only if corrected
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id_original_ocr: Option<String>,
}

impl Unit {
    /// Numeric value of the identifier, if it is all digits
    pub fn numeric_id(&self) -> Option<u64> {
        if self.id.is_empty() || !self.id.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.id.parse().ok()
    }
}

/// Site feature classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeatureType {
    Elevator,
    Highlight,
    Office,
    Stairs,
}

/// Non-unit feature of the site map
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteFeature {
    #[serde(rename = "type")]
    pub feature_type: FeatureType,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub label: Option<String>,
}

/// Unit counts reported with a floor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FloorStats {
    pub total_units: usize,
    pub units_with_id: usize,
    pub units_missing_id: usize,
}

/// Extraction result for one floor image
#[derive(Debug, Clone, PartialEq)]
pub struct Floor {
    pub id: String,
    pub name: String,
    /// Width of the output coordinate space
    pub width: u32,
    /// Height of the output coordinate space
    pub height: u32,
    pub source_image_width: u32,
    pub source_image_height: u32,
    pub units: Vec<Unit>,
    pub site_features: Vec<SiteFeature>,
}

impl Floor {
    pub fn stats(&self) -> FloorStats {
        let units_with_id = self.units.iter().filter(|u| !u.id.is_empty()).count();
        FloorStats {
            total_units: self.units.len(),
            units_with_id,
            units_missing_id: self.units.len() - units_with_id,
        }
    }

    /// Sort units by numeric ID; non-numeric and missing IDs go last.
    ///
    /// The sort is stable, so unreadable units keep detection order.
    pub fn sort_units(&mut self) {
        self.units
            .sort_by_key(|u| u.numeric_id().map_or((1, 0), |n| (0, n)));
    }

    /// Make non-empty unit IDs unique by suffixing repeats in encounter
    /// order: "101", "101-1", "101-2", ...
    pub fn ensure_unique_ids(&mut self) {
        let mut seen: rustc_hash::FxHashMap<String, usize> = Default::default();
        for unit in &mut self.units {
            if unit.id.is_empty() {
                continue;
            }
            match seen.get_mut(&unit.id) {
                Some(count) => {
                    *count += 1;
                    unit.id = format!("{}-{}", unit.id, count);
                }
                None => {
                    seen.insert(unit.id.clone(), 0);
                }
            }
        }
    }

    pub fn to_document(&self) -> FloorDocument {
        FloorDocument {
            floor: FloorHeader {
                id: self.id.clone(),
                name: self.name.clone(),
                width: self.width,
                height: self.height,
                source_image_width: self.source_image_width,
                source_image_height: self.source_image_height,
            },
            units: self.units.clone(),
            site_features: self.site_features.clone(),
            stats: self.stats(),
        }
    }
}

/// Floor description in the output document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FloorHeader {
    pub id: String,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub source_image_width: u32,
    pub source_image_height: u32,
}

/// Serialized extraction output consumed by the map renderer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FloorDocument {
    pub floor: FloorHeader,
    pub units: Vec<Unit>,
    pub site_features: Vec<SiteFeature>,
    pub stats: FloorStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: &str) -> Unit {
        Unit {
            id: id.to_string(),
            x: 0,
            y: 0,
            w: 75,
            h: 75,
            unit_type: "5x5".to_string(),
            id_original_ocr: None,
        }
    }

    fn floor(units: Vec<Unit>) -> Floor {
        Floor {
            id: "floor-1".into(),
            name: "Ground Floor".into(),
            width: 100,
            height: 100,
            source_image_width: 100,
            source_image_height: 100,
            units,
            site_features: Vec::new(),
        }
    }

    #[test]
    fn test_polygon_area() {
        let square = vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(10.0, 0.0),
            Point2D::new(10.0, 10.0),
            Point2D::new(0.0, 10.0),
        ];
        assert!((Point2D::polygon_area(&square) - 100.0).abs() < 0.001);
        assert_eq!(Point2D::polygon_area(&square[..2]), 0.0);
    }

    #[test]
    fn test_sort_units_numeric_first() {
        let mut f = floor(vec![unit("12"), unit(""), unit("9"), unit("A1"), unit("101")]);
        f.sort_units();
        let ids: Vec<&str> = f.units.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["9", "12", "101", "", "A1"]);
    }

    #[test]
    fn test_unique_ids_suffixing() {
        let mut f = floor(vec![unit("101"), unit("101"), unit(""), unit("101"), unit("")]);
        f.ensure_unique_ids();
        let ids: Vec<&str> = f.units.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["101", "101-1", "", "101-2", ""]);
    }

    #[test]
    fn test_document_serialization() {
        let mut corrected = unit("477");
        corrected.id_original_ocr = Some("77".into());
        let mut f = floor(vec![corrected, unit("")]);
        f.site_features.push(SiteFeature {
            feature_type: FeatureType::Office,
            x: 1,
            y: 2,
            w: 3,
            h: 4,
            label: Some("OFFICE".into()),
        });

        let json = serde_json::to_value(f.to_document()).unwrap();
        assert_eq!(json["floor"]["sourceImageWidth"], 100);
        assert_eq!(json["units"][0]["id_original_ocr"], "77");
        assert_eq!(json["units"][0]["type"], "5x5");
        assert!(json["units"][1].get("id_original_ocr").is_none());
        assert_eq!(json["siteFeatures"][0]["type"], "office");
        assert_eq!(json["stats"]["unitsWithId"], 1);
        assert_eq!(json["stats"]["unitsMissingId"], 1);
    }
}
