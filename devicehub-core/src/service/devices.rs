//! Device operations: registration, lookup, measurements, user links and
//! per-device statistics.

use crate::analytics::AxisStats;
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{
    Device, DeviceStatsReport, DeviceWithUsers, Measurement, MeasurementFilter, Period, Reading,
    User, UserDeviceLink,
};
use chrono::SubsecRound;
use std::sync::Arc;
use uuid::Uuid;

/// Device data access over a [`Store`].
pub struct DeviceService<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    empty_list_is_error: bool,
}

impl<S: Store + ?Sized> DeviceService<S> {
    /// Service using the system clock. An empty device list is reported
    /// as `DeviceNotFound`, matching the historical API.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            empty_list_is_error: true,
        }
    }

    /// Replace the clock used to timestamp new measurements.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Choose whether [`list_devices`](Self::list_devices) fails on an empty store.
    pub fn with_empty_list_error(mut self, enabled: bool) -> Self {
        self.empty_list_is_error = enabled;
        self
    }

    fn require_device(&self, id: Uuid) -> Result<Device> {
        self.store.get_device(id)?.ok_or_else(|| {
            tracing::warn!(device_id = %id, "Device not found");
            Error::DeviceNotFound
        })
    }

    /// Fetch a device with its linked users.
    pub fn get_device(&self, id: Uuid) -> Result<DeviceWithUsers> {
        let device = self.require_device(id)?;
        let users = self.store.device_users(id)?;
        Ok(DeviceWithUsers::new(device, users))
    }

    /// Register a new device under a fresh id.
    pub fn register_device(&self, serial_number: &str) -> Result<Device> {
        if self.store.find_device_by_serial(serial_number)?.is_some() {
            tracing::warn!(serial_number, "Device with this serial number already exists");
            return Err(Error::DuplicateSerialNumber);
        }

        let device = Device {
            id: Uuid::now_v7(),
            serial_number: serial_number.to_string(),
        };
        self.store.insert_device(&device)?;

        tracing::info!(device_id = %device.id, serial_number, "Registered device");
        Ok(device)
    }

    /// All devices, in registration order.
    pub fn list_devices(&self) -> Result<Vec<Device>> {
        let devices = self.store.list_devices()?;
        if devices.is_empty() && self.empty_list_is_error {
            return Err(Error::DeviceNotFound);
        }
        Ok(devices)
    }

    /// Delete a device together with its measurements and user links.
    pub fn delete_device(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_device(id)? {
            tracing::warn!(device_id = %id, "Device not found");
            return Err(Error::DeviceNotFound);
        }
        tracing::info!(device_id = %id, "Deleted device");
        Ok(())
    }

    /// Per-axis statistics over the device's measurements in `period`.
    ///
    /// The device is checked before measurements are queried, so a missing
    /// device always reports `DeviceNotFound`.
    pub fn get_device_stats(&self, device_id: Uuid, period: Period) -> Result<DeviceStatsReport> {
        self.require_device(device_id)?;

        let measurements = self
            .store
            .query_measurements(&MeasurementFilter::for_device(device_id, period))?;
        if measurements.is_empty() {
            tracing::warn!(device_id = %device_id, ?period, "No measurements in period");
            return Err(Error::MeasurementNotFound);
        }

        Ok(DeviceStatsReport {
            device_id,
            stats: AxisStats::from_measurements(&measurements),
            period,
        })
    }

    /// Store a reading, timestamped now by the service clock.
    ///
    /// Readings with a NaN or infinite axis are rejected.
    pub fn add_measurement(&self, device_id: Uuid, reading: Reading) -> Result<Measurement> {
        self.require_device(device_id)?;

        if let Some(axis) = reading.non_finite_axis() {
            tracing::warn!(device_id = %device_id, axis, "Rejected non-finite reading");
            return Err(Error::InvalidMeasurement(format!(
                "{} must be a finite number",
                axis
            )));
        }

        // Stored precision is microseconds; truncate so the returned record
        // matches what a later read yields.
        let measurement = Measurement {
            id: Uuid::now_v7(),
            device_id,
            timestamp: self.clock.now().trunc_subsecs(6),
            x: reading.x,
            y: reading.y,
            z: reading.z,
        };
        self.store.insert_measurement(&measurement)?;

        tracing::info!(
            device_id = %device_id,
            measurement_id = %measurement.id,
            "Added measurement"
        );
        Ok(measurement)
    }

    /// Measurements in `period`, newest first.
    pub fn get_device_measurements(
        &self,
        device_id: Uuid,
        period: Period,
    ) -> Result<Vec<Measurement>> {
        let measurements = self
            .store
            .query_measurements(&MeasurementFilter::for_device(device_id, period).newest_first())?;

        if measurements.is_empty() {
            tracing::warn!(device_id = %device_id, ?period, "No measurements in period");
            return Err(Error::MeasurementNotFound);
        }
        Ok(measurements)
    }

    /// Link a user to a device and return the device's updated user list.
    ///
    /// Checks run device first, then user, then the existing link.
    pub fn add_user_to_device(&self, device_id: Uuid, user_id: Uuid) -> Result<DeviceWithUsers> {
        let device = self.require_device(device_id)?;

        if self.store.get_user(user_id)?.is_none() {
            tracing::warn!(user_id = %user_id, "User not found");
            return Err(Error::UserNotFound);
        }

        let link = UserDeviceLink { user_id, device_id };
        if self.store.link_exists(&link)? {
            tracing::warn!(device_id = %device_id, user_id = %user_id, "User already linked");
            return Err(Error::UserAlreadyLinked);
        }
        self.store.insert_link(&link)?;

        tracing::info!(device_id = %device_id, user_id = %user_id, "Linked user to device");

        let users = self.store.device_users(device_id)?;
        Ok(DeviceWithUsers::new(device, users))
    }

    /// Users linked to a device.
    pub fn get_device_users(&self, device_id: Uuid) -> Result<Vec<User>> {
        self.require_device(device_id)?;
        self.store.device_users(device_id)
    }
}
