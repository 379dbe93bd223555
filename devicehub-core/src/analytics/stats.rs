//! Per-axis descriptive statistics.
//!
//! [`compute_stats`] summarizes one axis worth of values. It is called once
//! per axis (x, y, z) for every stats request; the axes are independent and
//! never merged.
//!
//! ## Empty-set policy
//!
//! An empty input is not an error. It yields [`StatsSummary::EMPTY`], where
//! every field is zero. Callers that must distinguish "no data" (for example
//! device stats, which report `MeasurementNotFound`) check emptiness before
//! calling.

use crate::types::Measurement;
use serde::{Deserialize, Serialize};

/// Descriptive statistics for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatsSummary {
    pub min: f64,
    pub max: f64,
    pub count: usize,
    pub sum: f64,
    pub median: f64,
}

impl StatsSummary {
    /// Zero-value summary for an empty input.
    pub const EMPTY: StatsSummary = StatsSummary {
        min: 0.0,
        max: 0.0,
        count: 0,
        sum: 0.0,
        median: 0.0,
    };

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Compute min, max, count, sum and median over `values`.
///
/// Works on a sorted copy. Sorting uses [`f64::total_cmp`], so the order is
/// total and deterministic even for NaN or signed zeros. The sum is taken
/// over the sorted copy, which makes the result independent of input order.
///
/// The median is the middle element for an odd count, and the mean of the
/// elements at `count / 2 - 1` and `count / 2` for an even count.
pub fn compute_stats(values: &[f64]) -> StatsSummary {
    if values.is_empty() {
        return StatsSummary::EMPTY;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let count = sorted.len();
    let mid = count / 2;
    let median = if count % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    };

    StatsSummary {
        min: sorted[0],
        max: sorted[count - 1],
        count,
        sum: sorted.iter().sum(),
        median,
    }
}

/// Summaries for the three axes of a measurement set.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisStats {
    pub x: StatsSummary,
    pub y: StatsSummary,
    pub z: StatsSummary,
}

impl AxisStats {
    /// Run the engine once per axis over `measurements`.
    pub fn from_measurements<'a, I>(measurements: I) -> Self
    where
        I: IntoIterator<Item = &'a Measurement>,
    {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        let mut zs = Vec::new();
        for m in measurements {
            xs.push(m.x);
            ys.push(m.y);
            zs.push(m.z);
        }

        Self {
            x: compute_stats(&xs),
            y: compute_stats(&ys),
            z: compute_stats(&zs),
        }
    }
}
