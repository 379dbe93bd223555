//! Analytics module for devicehub
//!
//! Provides the statistics engine: per-axis descriptive statistics
//! (min, max, count, sum, median) over measurement sets.
//!
//! The engine is pure computation over in-memory values. Data access
//! (see [`crate::service`]) is responsible for fetching and filtering
//! measurements before handing them over.

pub mod stats;

pub use stats::{compute_stats, AxisStats, StatsSummary};
