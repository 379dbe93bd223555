//! # devicehub-core
//!
//! Core library for devicehub - a backend for devices, their owners and
//! x/y/z sensor measurements.
//!
//! This library provides:
//! - Domain types for users, devices, measurements and stats reports
//! - A statistics engine (min, max, count, sum, median per axis)
//! - A storage contract with SQLite and in-memory implementations
//! - Device and user data-access services
//! - Configuration management and logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use devicehub_core::{Config, Database, DeviceService, Period, Reading};
//! use std::sync::Arc;
//!
//! let config = Config::load().expect("failed to load config");
//!
//! let db = Database::open(&config.resolved_database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let devices = DeviceService::new(Arc::new(db));
//! let device = devices.register_device("SN-0001").expect("register");
//! devices
//!     .add_measurement(device.id, Reading::new(0.1, 0.2, 9.8))
//!     .expect("measure");
//! let report = devices.get_device_stats(device.id, Period::all()).expect("stats");
//! println!("z median: {}", report.stats.z.median);
//! ```

// Re-export commonly used items at the crate root
pub use analytics::{compute_stats, AxisStats, StatsSummary};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use service::{DeviceService, UserMeasurements, UserService};
pub use store::{MemoryStore, Store};
pub use types::*;

// Public modules
pub mod analytics;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod service;
pub mod store;
pub mod types;
