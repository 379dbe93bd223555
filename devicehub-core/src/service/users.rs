//! User operations: creation, lookup and cross-device statistics.

use crate::analytics::AxisStats;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{
    Device, DeviceStats, Measurement, MeasurementFilter, Period, User, UserAggregatedStats,
    UserDevicesStats, UserWithDevices,
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// A user's measurements in a period, grouped per device and flattened.
#[derive(Debug, Clone)]
pub struct UserMeasurements {
    pub user: User,
    /// Devices linked to the user, in id order
    pub devices: Vec<Device>,
    /// One entry per device in `devices`, possibly empty
    pub by_device: HashMap<Uuid, Vec<Measurement>>,
    /// Every matching measurement across all devices, oldest first
    pub all: Vec<Measurement>,
}

/// User data access over a [`Store`].
pub struct UserService<S: ?Sized> {
    store: Arc<S>,
}

impl<S: Store + ?Sized> UserService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create a user under a fresh id. Names are unique.
    pub fn create_user(&self, name: &str) -> Result<User> {
        if self.store.find_user_by_name(name)?.is_some() {
            tracing::warn!(name, "User already exists");
            return Err(Error::UserAlreadyExists);
        }

        let user = User {
            id: Uuid::now_v7(),
            name: name.to_string(),
        };
        self.store.insert_user(&user)?;

        tracing::info!(user_id = %user.id, name, "Created user");
        Ok(user)
    }

    /// Fetch a user with their linked devices.
    pub fn get_user(&self, id: Uuid) -> Result<UserWithDevices> {
        let user = self.require_user(id)?;
        let devices = self.store.user_devices(id)?;
        Ok(UserWithDevices::new(user, devices))
    }

    /// All users. An empty store yields an empty list.
    pub fn list_users(&self) -> Result<Vec<User>> {
        self.store.list_users()
    }

    fn require_user(&self, id: Uuid) -> Result<User> {
        self.store.get_user(id)?.ok_or_else(|| {
            tracing::warn!(user_id = %id, "User not found");
            Error::UserNotFound
        })
    }

    /// Collect the user's measurements in `period` across every linked device.
    pub fn gather_user_measurements(
        &self,
        user_id: Uuid,
        period: Period,
    ) -> Result<UserMeasurements> {
        let user = self.require_user(user_id)?;
        let devices = self.store.user_devices(user_id)?;

        let filter = MeasurementFilter {
            device_ids: devices.iter().map(|d| d.id).collect(),
            period,
            ..Default::default()
        };
        let all = self.store.query_measurements(&filter)?;

        let mut by_device: HashMap<Uuid, Vec<Measurement>> =
            devices.iter().map(|d| (d.id, Vec::new())).collect();
        for m in &all {
            if let Some(group) = by_device.get_mut(&m.device_id) {
                group.push(m.clone());
            }
        }

        tracing::debug!(
            user_id = %user_id,
            devices = devices.len(),
            measurements = all.len(),
            "Gathered user measurements"
        );

        Ok(UserMeasurements {
            user,
            devices,
            by_device,
            all,
        })
    }

    /// Statistics over all of the user's measurements, across devices.
    pub fn get_user_aggregated_stats(
        &self,
        user_id: Uuid,
        period: Period,
    ) -> Result<UserAggregatedStats> {
        let gathered = self.gather_user_measurements(user_id, period)?;

        Ok(UserAggregatedStats {
            user_id,
            total_devices: gathered.devices.len(),
            total_measurements: gathered.all.len(),
            period,
            stats: AxisStats::from_measurements(&gathered.all),
        })
    }

    /// Statistics for each of the user's devices separately.
    ///
    /// Devices without matching measurements get the empty summary.
    pub fn get_user_devices_stats(
        &self,
        user_id: Uuid,
        period: Period,
    ) -> Result<UserDevicesStats> {
        let gathered = self.gather_user_measurements(user_id, period)?;

        let devices = gathered
            .devices
            .iter()
            .map(|device| DeviceStats {
                device_id: device.id,
                stats: gathered
                    .by_device
                    .get(&device.id)
                    .map(AxisStats::from_measurements)
                    .unwrap_or_default(),
            })
            .collect();

        Ok(UserDevicesStats {
            user_id,
            total_devices: gathered.devices.len(),
            total_measurements: gathered.all.len(),
            period,
            devices,
        })
    }
}
