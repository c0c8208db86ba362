/*
 * SPDX-FileCopyrightText: Copyright (c) 2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: Apache-2.0
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Raw-reading to engineering-unit conversion.
//!
//! Tank level arrives as a differential-pressure reading in inches of
//! water and maps to kilograms through a per-device piecewise-linear
//! calibration table. Flow arrives as 16-bit totalizer words.

use serde::{Deserialize, Serialize};

/// Fallback calibration when no table segment brackets the reading.
pub const DEFAULT_SLOPE: f64 = 42.848148;
pub const DEFAULT_INTERCEPT: f64 = -267.518519;

/// One segment of a tank's calibration table: `y = slope*x + intercept`
/// valid on `[in_h2o_min, in_h2o_max]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Segment {
    pub in_h2o_min: f64,
    pub in_h2o_max: f64,
    pub slope: f64,
    pub intercept: f64,
}

/// Convert a raw level reading into `(kilograms, cubic meters)`.
///
/// The first segment whose bracket contains the reading wins; with no
/// match the default constants apply. A zero reading means an empty
/// tank, not a reading to run through the intercept.
pub fn level_volumes(raw: f64, table: &[Segment], density_divisor: f64) -> (f64, f64) {
    if raw == 0.0 {
        return (0.0, 0.0);
    }

    let (slope, intercept) = table
        .iter()
        .find(|segment| segment.in_h2o_min <= raw && raw <= segment.in_h2o_max)
        .map(|segment| (segment.slope, segment.intercept))
        .unwrap_or((DEFAULT_SLOPE, DEFAULT_INTERCEPT));

    let kilograms = raw * slope + intercept;
    (kilograms, kilograms / density_divisor)
}

/// Decode the totalized volume from its high/low/decimal words.
pub fn total_volume(v_hi: i32, v_lo: i32, v_dec: i32) -> f64 {
    f64::from(v_hi) * 65536.0 + f64::from(v_lo) + f64::from(v_dec) / 1000.0
}

/// Decode the instantaneous flow rate from its high/low words.
pub fn flow_rate(f_rate_hi: i32, f_rate_lo: i32) -> f64 {
    (f64::from(f_rate_hi) * 65536.0 + f64::from(f_rate_lo)) / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_segment_table() -> Vec<Segment> {
        vec![
            Segment {
                in_h2o_min: 0.0,
                in_h2o_max: 10.0,
                slope: 2.0,
                intercept: 1.0,
            },
            Segment {
                in_h2o_min: 10.0,
                in_h2o_max: 20.0,
                slope: 3.0,
                intercept: -5.0,
            },
        ]
    }

    #[test]
    fn level_picks_bracketing_segment() {
        let table = two_segment_table();
        let (kg, _) = level_volumes(4.0, &table, 1.29);
        assert_eq!(kg, 9.0);

        let (kg, _) = level_volumes(15.0, &table, 1.29);
        assert_eq!(kg, 40.0);
    }

    #[test]
    fn zero_level_short_circuits() {
        let (kg, m3) = level_volumes(0.0, &two_segment_table(), 1.29);
        assert_eq!(kg, 0.0);
        assert_eq!(m3, 0.0);
    }

    #[test]
    fn unbracketed_level_uses_defaults() {
        let (kg, _) = level_volumes(50.0, &two_segment_table(), 1.29);
        assert_eq!(kg, 50.0 * DEFAULT_SLOPE + DEFAULT_INTERCEPT);
    }

    #[test]
    fn empty_table_uses_defaults() {
        let (kg, _) = level_volumes(12.0, &[], 1.29);
        assert_eq!(kg, 12.0 * DEFAULT_SLOPE + DEFAULT_INTERCEPT);
    }

    #[test]
    fn cubic_meters_divide_by_density() {
        let table = two_segment_table();
        let (kg, m3) = level_volumes(4.0, &table, 1.29);
        assert_eq!(m3, kg / 1.29);

        // The divisor is configuration, not a constant.
        let (kg, m3) = level_volumes(4.0, &table, 0.777);
        assert_eq!(m3, kg / 0.777);
    }

    #[test]
    fn segment_boundaries_are_inclusive() {
        let table = two_segment_table();
        let (kg, _) = level_volumes(10.0, &table, 1.29);
        // First matching segment wins at a shared boundary.
        assert_eq!(kg, 10.0 * 2.0 + 1.0);

        let (kg, _) = level_volumes(20.0, &table, 1.29);
        assert_eq!(kg, 20.0 * 3.0 - 5.0);
    }

    #[test]
    fn totalizer_words() {
        assert_eq!(total_volume(1, 2, 500), 65538.5);
        assert_eq!(total_volume(0, 0, 0), 0.0);
    }

    #[test]
    fn flow_rate_words() {
        assert_eq!(flow_rate(0, 2000), 2.0);
        assert_eq!(flow_rate(1, 0), 65.536);
    }
}
