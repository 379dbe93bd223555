//! Core domain types for devicehub
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **User** | A named owner; may own many devices |
//! | **Device** | A sensor identified by a globally unique serial number |
//! | **Measurement** | One immutable x/y/z reading, timestamped by the server |
//! | **Link** | The many-to-many association between a user and a device |
//! | **Period** | Inclusive `[start, end]` timestamp filter, either bound optional |
//! | **Axis** | One of x, y, z; statistics are computed per axis |

use crate::analytics::AxisStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================
// Users and devices
// ============================================

/// A device owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
}

/// A registered device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: Uuid,
    pub serial_number: String,
}

/// Association record between a user and a device.
///
/// Identity is the `(user_id, device_id)` pair; a pair can exist once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserDeviceLink {
    pub user_id: Uuid,
    pub device_id: Uuid,
}

/// A device together with the users linked to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceWithUsers {
    pub id: Uuid,
    pub serial_number: String,
    pub users: Vec<User>,
}

impl DeviceWithUsers {
    pub fn new(device: Device, users: Vec<User>) -> Self {
        Self {
            id: device.id,
            serial_number: device.serial_number,
            users,
        }
    }
}

/// A user together with the devices linked to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserWithDevices {
    pub id: Uuid,
    pub name: String,
    pub devices: Vec<Device>,
}

impl UserWithDevices {
    pub fn new(user: User, devices: Vec<Device>) -> Self {
        Self {
            id: user.id,
            name: user.name,
            devices,
        }
    }
}

// ============================================
// Measurements
// ============================================

/// Client-supplied part of a measurement.
///
/// The timestamp and id are always assigned server-side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Reading {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Name of the first axis holding a NaN or infinite value, if any.
    pub fn non_finite_axis(&self) -> Option<&'static str> {
        [("x", self.x), ("y", self.y), ("z", self.z)]
            .into_iter()
            .find(|(_, v)| !v.is_finite())
            .map(|(axis, _)| axis)
    }
}

/// A stored measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: Uuid,
    pub device_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Measurement {
    pub fn reading(&self) -> Reading {
        Reading::new(self.x, self.y, self.z)
    }
}

/// Inclusive timestamp window. A `None` bound is unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl Period {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// The unbounded period.
    pub fn all() -> Self {
        Self::default()
    }

    /// Whether `ts` falls inside the period, bounds included.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| ts >= start) && self.end.map_or(true, |end| ts <= end)
    }
}

/// Sort order for measurement queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeOrder {
    /// Oldest first
    #[default]
    Ascending,
    /// Newest first
    Descending,
}

/// Filter for measurement queries.
#[derive(Debug, Clone, Default)]
pub struct MeasurementFilter {
    /// Devices to include; an empty list matches nothing
    pub device_ids: Vec<Uuid>,
    /// Timestamp window
    pub period: Period,
    /// Result ordering by timestamp (ties by id, same direction)
    pub order: TimeOrder,
}

impl MeasurementFilter {
    pub fn for_device(device_id: Uuid, period: Period) -> Self {
        Self {
            device_ids: vec![device_id],
            period,
            order: TimeOrder::Ascending,
        }
    }

    pub fn newest_first(mut self) -> Self {
        self.order = TimeOrder::Descending;
        self
    }
}

// ============================================
// Stats reports
// ============================================

/// Per-axis statistics for one device, with the period echoed back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatsReport {
    pub device_id: Uuid,
    #[serde(flatten)]
    pub stats: AxisStats,
    pub period: Period,
}

/// Statistics across every device a user owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAggregatedStats {
    pub user_id: Uuid,
    pub total_devices: usize,
    pub total_measurements: usize,
    pub period: Period,
    pub stats: AxisStats,
}

/// Statistics for one of a user's devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStats {
    pub device_id: Uuid,
    pub stats: AxisStats,
}

/// Per-device statistics for every device a user owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDevicesStats {
    pub user_id: Uuid,
    pub total_devices: usize,
    pub total_measurements: usize,
    pub period: Period,
    pub devices: Vec<DeviceStats>,
}

impl UserDevicesStats {
    /// Stats for a specific device, if the user owns it.
    pub fn device(&self, device_id: Uuid) -> Option<&DeviceStats> {
        self.devices.iter().find(|d| d.device_id == device_id)
    }
}

/// Aggregate row counts across the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub users: usize,
    pub devices: usize,
    pub measurements: usize,
    pub links: usize,
}
