// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Identifier correction against a known valid range
//!
//! Bold sans-serif digits are misread in systematic ways (5 and 9, 6 and 8,
//! 3 and 8, 1 and 7). When the floor's identifier range is known, readings
//! outside it are remapped through these confusions, and short readings
//! that lost their leading digit get one back.

use crate::error::VisionError;
use crate::types::Unit;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Inclusive range of valid identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdRange {
    pub start: u64,
    pub end: u64,
}

impl IdRange {
    pub fn contains(&self, value: u64) -> bool {
        self.start <= value && value <= self.end
    }

    fn contains_str(&self, id: &str) -> bool {
        id.parse::<u64>().is_ok_and(|v| self.contains(v))
    }
}

impl FromStr for IdRange {
    type Err = VisionError;

    /// Parse `"start-end"`, e.g. `"400-589"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || VisionError::InvalidRange(s.to_string());
        let (start, end) = s.split_once('-').ok_or_else(invalid)?;
        let start = start.trim().parse().map_err(|_| invalid())?;
        let end = end.trim().parse().map_err(|_| invalid())?;
        Ok(Self { start, end })
    }
}

/// Configuration for identifier correction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Digit -> digits it is commonly misread as, in preference order
    pub confusions: BTreeMap<char, Vec<char>>,
    /// Readings shorter than this may have lost a leading digit
    pub full_length: usize,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        let confusions = [
            ('5', vec!['9']),
            ('9', vec!['5']),
            ('6', vec!['8']),
            ('8', vec!['6', '3']),
            ('3', vec!['8']),
            ('1', vec!['7']),
            ('7', vec!['1']),
        ]
        .into_iter()
        .collect();

        Self {
            confusions,
            full_length: 3,
        }
    }
}

/// Correct out-of-range identifiers in place; returns the number corrected.
///
/// Corrected units keep their original reading in `id_original_ocr`.
pub fn correct_ids(units: &mut [Unit], range: &IdRange, config: &CorrectionConfig) -> usize {
    let mut fixed = 0;

    for unit in units.iter_mut() {
        if unit.id.is_empty() || !unit.id.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        let Ok(value) = unit.id.parse::<u64>() else {
            continue;
        };
        if range.contains(value) {
            continue;
        }

        let fix = find_fix(&unit.id, range, config)
            .or_else(|| restore_leading_digit(&unit.id, range, config));

        if let Some(fix) = fix {
            tracing::debug!(from = %unit.id, to = %fix, "corrected identifier");
            unit.id_original_ocr = Some(std::mem::replace(&mut unit.id, fix));
            fixed += 1;
        }
    }

    if fixed > 0 {
        tracing::info!(fixed, start = range.start, end = range.end, "fixed identifier misreads");
    }

    fixed
}

/// First confusion substitution of `id` that lands in range.
///
/// Every position may keep its digit or take one of its confusions;
/// combinations are tried in product order (last position varies fastest)
/// and the unchanged reading is skipped.
pub fn find_fix(id: &str, range: &IdRange, config: &CorrectionConfig) -> Option<String> {
    let options: Vec<Vec<char>> = id
        .chars()
        .map(|digit| {
            let mut alts = vec![digit];
            if let Some(confused) = config.confusions.get(&digit) {
                alts.extend(confused);
            }
            alts
        })
        .collect();

    if options.is_empty() {
        return None;
    }

    let mut indices = vec![0usize; options.len()];
    loop {
        let candidate: String = indices
            .iter()
            .zip(&options)
            .map(|(&i, alts)| alts[i])
            .collect();
        if candidate != id && range.contains_str(&candidate) {
            return Some(candidate);
        }

        // Advance the odometer, last position fastest
        let mut pos = options.len();
        loop {
            if pos == 0 {
                return None;
            }
            pos -= 1;
            indices[pos] += 1;
            if indices[pos] < options[pos].len() {
                break;
            }
            indices[pos] = 0;
        }
    }
}

/// Prefix a short reading with each leading digit 1-9, zero-padded to two
/// digits, and return the first that lands in range
fn restore_leading_digit(id: &str, range: &IdRange, config: &CorrectionConfig) -> Option<String> {
    if id.len() >= config.full_length {
        return None;
    }
    (1..=9)
        .map(|prefix| format!("{}{:0>2}", prefix, id))
        .find(|candidate| range.contains_str(candidate))
}
