// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Unit-mix validation against expected per-size counts
//!
//! Expected counts come from external planning documents and may be
//! internally inconsistent (a stated total that differs from the sum of
//! its rows). The report shows such disagreements; it never adjusts them.

use crate::catalog::Catalog;
use crate::error::Result;
use crate::types::Unit;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Size key for units with an unmappable dimension
pub const UNKNOWN_SIZE: &str = "unknown";

/// Odd sizes listed in the report before truncating
const MAX_LISTED_ODD_UNITS: usize = 15;

/// Expected unit counts per size key for one floor
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedMix {
    pub counts: BTreeMap<String, usize>,
    /// Total as stated by the source document, if any
    #[serde(default)]
    pub stated_total: Option<usize>,
}

impl ExpectedMix {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn row_sum(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Comparison outcome for one size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeStatus {
    Ok,
    Missing(usize),
    Excess(usize),
    /// Detected but not expected at all
    Unexpected,
    /// Units with an unmappable dimension
    Noise,
}

impl fmt::Display for SizeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeStatus::Ok => write!(f, "OK"),
            SizeStatus::Missing(n) => write!(f, "MISSING {}", n),
            SizeStatus::Excess(n) => write!(f, "EXCESS {}", n),
            SizeStatus::Unexpected => write!(f, "UNEXPECTED"),
            SizeStatus::Noise => write!(f, "NOISE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeRow {
    pub size: String,
    pub detected: usize,
    pub expected: usize,
    pub status: SizeStatus,
}

impl SizeRow {
    pub fn delta(&self) -> i64 {
        self.detected as i64 - self.expected as i64
    }
}

/// A unit whose size is not part of the expected mix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OddUnit {
    pub id: String,
    pub w: u32,
    pub h: u32,
    pub size: String,
}

/// Detected versus expected unit counts per size
#[derive(Debug, Clone, PartialEq)]
pub struct UnitMixReport {
    pub rows: Vec<SizeRow>,
    pub odd_units: Vec<OddUnit>,
    pub total_detected: usize,
    pub total_expected: usize,
    pub stated_total: Option<usize>,
}

impl UnitMixReport {
    /// Compare units (in source pixels) against an expected mix
    pub fn from_units(units: &[Unit], catalog: &Catalog, expected: &ExpectedMix) -> Self {
        let mut detected: BTreeMap<String, usize> = BTreeMap::new();
        let mut odd_units = Vec::new();

        for unit in units {
            let size = catalog
                .size_key(unit.w, unit.h)
                .unwrap_or_else(|| UNKNOWN_SIZE.to_string());
            if size != UNKNOWN_SIZE && !expected.counts.contains_key(&size) {
                odd_units.push(OddUnit {
                    id: unit.id.clone(),
                    w: unit.w,
                    h: unit.h,
                    size: size.clone(),
                });
            }
            *detected.entry(size).or_default() += 1;
        }

        let mut sizes: Vec<&String> = expected.counts.keys().chain(detected.keys()).collect();
        sizes.sort_by(|a, b| {
            let (ka, kb) = (size_order(a), size_order(b));
            ka.0.cmp(&kb.0)
                .then(ka.1.total_cmp(&kb.1))
                .then(ka.2.total_cmp(&kb.2))
        });
        sizes.dedup();

        let rows = sizes
            .into_iter()
            .map(|size| {
                let det = detected.get(size).copied().unwrap_or(0);
                let exp = expected.counts.get(size).copied().unwrap_or(0);
                SizeRow {
                    size: size.clone(),
                    detected: det,
                    expected: exp,
                    status: status(size, det, exp),
                }
            })
            .collect();

        Self {
            rows,
            odd_units,
            total_detected: units.len(),
            total_expected: expected.row_sum(),
            stated_total: expected.stated_total,
        }
    }

    /// Stated total and row sum, when they disagree
    pub fn inconsistent_total(&self) -> Option<(usize, usize)> {
        self.stated_total
            .filter(|&stated| stated != self.total_expected)
            .map(|stated| (stated, self.total_expected))
    }

    /// Human-readable issue per mismatched size
    pub fn issues(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| match row.status {
                SizeStatus::Missing(n) => Some(format!("{}: missing {} units", row.size, n)),
                SizeStatus::Excess(n) => Some(format!(
                    "{}: {} excess (likely merged/misclassified)",
                    row.size, n
                )),
                SizeStatus::Unexpected => Some(format!(
                    "{}: {} excess (likely merged/misclassified)",
                    row.size, row.detected
                )),
                SizeStatus::Ok | SizeStatus::Noise => None,
            })
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.issues().is_empty()
    }
}

fn status(size: &str, detected: usize, expected: usize) -> SizeStatus {
    if size == UNKNOWN_SIZE {
        return if detected > 0 {
            SizeStatus::Noise
        } else {
            SizeStatus::Ok
        };
    }
    match detected.cmp(&expected) {
        std::cmp::Ordering::Equal => SizeStatus::Ok,
        std::cmp::Ordering::Less => SizeStatus::Missing(expected - detected),
        std::cmp::Ordering::Greater if expected == 0 => SizeStatus::Unexpected,
        std::cmp::Ordering::Greater => SizeStatus::Excess(detected - expected),
    }
}

/// Sort key: known sizes by their numeric feet, unknown last
fn size_order(size: &str) -> (u8, f64, f64) {
    let parsed = size
        .split_once('x')
        .and_then(|(a, b)| Some((a.parse::<f64>().ok()?, b.parse::<f64>().ok()?)));
    match parsed {
        Some((a, b)) => (0, a, b),
        None => (1, f64::MAX, f64::MAX),
    }
}

impl fmt::Display for UnitMixReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Detected: {} units | Expected: {} units",
            self.total_detected, self.total_expected
        )?;
        if let Some((stated, sum)) = self.inconsistent_total() {
            writeln!(
                f,
                "Note: stated total {} differs from the row sum {}",
                stated, sum
            )?;
        }
        writeln!(
            f,
            "  {:>10}  {:>8}  {:>8}  {:>8}  Status",
            "Size", "Detected", "Expected", "Delta"
        )?;
        for row in &self.rows {
            writeln!(
                f,
                "  {:>10}  {:>8}  {:>8}  {:>+8}  {}",
                row.size,
                row.detected,
                row.expected,
                row.delta(),
                row.status
            )?;
        }
        writeln!(
            f,
            "  {:>10}  {:>8}  {:>8}  {:>+8}",
            "TOTAL",
            self.total_detected,
            self.total_expected,
            self.total_detected as i64 - self.total_expected as i64
        )?;

        if !self.odd_units.is_empty() {
            writeln!(f, "Unexpected sizes detected ({} units):", self.odd_units.len())?;
            for odd in self.odd_units.iter().take(MAX_LISTED_ODD_UNITS) {
                writeln!(f, "  Unit {}: {}x{}px -> {}", odd.id, odd.w, odd.h, odd.size)?;
            }
            if self.odd_units.len() > MAX_LISTED_ODD_UNITS {
                writeln!(
                    f,
                    "  ... and {} more",
                    self.odd_units.len() - MAX_LISTED_ODD_UNITS
                )?;
            }
        }

        Ok(())
    }
}
