//! Persistence contract for devicehub
//!
//! [`Store`] is the set of capabilities the data-access layer needs from a
//! backing store:
//! - insert/fetch/list of users, devices and measurements
//! - lookup by unique key (serial number, user name)
//! - filtered measurement queries
//! - related-collection fetches across the user/device link table
//! - uniqueness enforcement, reported as the named error kinds
//!
//! Every mutating method is a single committed write. Two implementations
//! exist: [`crate::db::Database`] (SQLite) and [`MemoryStore`] (tests).

pub mod memory;

pub use memory::MemoryStore;

use crate::error::{Error, Result};
use crate::types::{Device, Measurement, MeasurementFilter, StoreCounts, User, UserDeviceLink};
use chrono::{DateTime, Datelike, Utc};
use std::ops::RangeInclusive;
use uuid::Uuid;

/// Calendar years a measurement timestamp may fall in.
///
/// SQLite keeps timestamps as four-digit-year RFC3339 text; outside this
/// range the text no longer sorts in time order.
pub const STORABLE_YEARS: RangeInclusive<i32> = 0..=9999;

/// Reject timestamps no store can hold.
pub fn check_storable(ts: DateTime<Utc>) -> Result<()> {
    if STORABLE_YEARS.contains(&ts.year()) {
        Ok(())
    } else {
        Err(Error::InvalidMeasurement(format!(
            "timestamp {} is outside years {}..={}",
            ts,
            STORABLE_YEARS.start(),
            STORABLE_YEARS.end()
        )))
    }
}

/// Backing store for users, devices, measurements and links.
///
/// Implementations must enforce:
/// - unique `serial_number`, reported as `Error::DuplicateSerialNumber`
/// - unique user `name`, reported as `Error::UserAlreadyExists`
/// - unique `(user_id, device_id)` links, reported as `Error::UserAlreadyLinked`
/// - measurements referencing an existing device, else `Error::DeviceNotFound`
/// - measurement timestamps within [`STORABLE_YEARS`], else
///   `Error::InvalidMeasurement`
///
/// Period bounds in a [`MeasurementFilter`] may be any instant.
pub trait Store: Send + Sync {
    // Devices
    fn insert_device(&self, device: &Device) -> Result<()>;
    fn get_device(&self, id: Uuid) -> Result<Option<Device>>;
    fn find_device_by_serial(&self, serial_number: &str) -> Result<Option<Device>>;
    fn list_devices(&self) -> Result<Vec<Device>>;
    /// Delete a device with its measurements and links. Returns false if absent.
    fn delete_device(&self, id: Uuid) -> Result<bool>;

    // Users
    fn insert_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: Uuid) -> Result<Option<User>>;
    fn find_user_by_name(&self, name: &str) -> Result<Option<User>>;
    fn list_users(&self) -> Result<Vec<User>>;

    // Measurements
    fn insert_measurement(&self, measurement: &Measurement) -> Result<()>;
    fn query_measurements(&self, filter: &MeasurementFilter) -> Result<Vec<Measurement>>;

    // Links
    fn insert_link(&self, link: &UserDeviceLink) -> Result<()>;
    fn link_exists(&self, link: &UserDeviceLink) -> Result<bool>;
    /// Users linked to a device, in id order.
    fn device_users(&self, device_id: Uuid) -> Result<Vec<User>>;
    /// Devices linked to a user, in id order.
    fn user_devices(&self, user_id: Uuid) -> Result<Vec<Device>>;

    /// Row counts for status reporting.
    fn counts(&self) -> Result<StoreCounts>;
}
