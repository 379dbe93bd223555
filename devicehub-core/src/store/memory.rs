//! In-memory [`Store`] for tests.
//!
//! Mirrors the SQLite store's constraints (unique keys, link identity,
//! measurement foreign key, cascade on device delete) so services behave
//! the same against either backend.

use super::{check_storable, Store};
use crate::error::{Error, Result};
use crate::types::{
    Device, Measurement, MeasurementFilter, StoreCounts, TimeOrder, User, UserDeviceLink,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<Uuid, User>,
    devices: BTreeMap<Uuid, Device>,
    measurements: Vec<Measurement>,
    /// (user_id, device_id)
    links: BTreeSet<(Uuid, Uuid)>,
}

/// Store backed by in-process collections.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| Error::StorePoisoned)
    }
}

impl Store for MemoryStore {
    fn insert_device(&self, device: &Device) -> Result<()> {
        let mut t = self.tables()?;
        if t
            .devices
            .values()
            .any(|d| d.serial_number == device.serial_number)
        {
            return Err(Error::DuplicateSerialNumber);
        }
        t.devices.insert(device.id, device.clone());
        Ok(())
    }

    fn get_device(&self, id: Uuid) -> Result<Option<Device>> {
        Ok(self.tables()?.devices.get(&id).cloned())
    }

    fn find_device_by_serial(&self, serial_number: &str) -> Result<Option<Device>> {
        Ok(self
            .tables()?
            .devices
            .values()
            .find(|d| d.serial_number == serial_number)
            .cloned())
    }

    fn list_devices(&self) -> Result<Vec<Device>> {
        Ok(self.tables()?.devices.values().cloned().collect())
    }

    fn delete_device(&self, id: Uuid) -> Result<bool> {
        let mut t = self.tables()?;
        if t.devices.remove(&id).is_none() {
            return Ok(false);
        }
        t.measurements.retain(|m| m.device_id != id);
        t.links.retain(|(_, device_id)| *device_id != id);
        Ok(true)
    }

    fn insert_user(&self, user: &User) -> Result<()> {
        let mut t = self.tables()?;
        if t.users.values().any(|u| u.name == user.name) {
            return Err(Error::UserAlreadyExists);
        }
        t.users.insert(user.id, user.clone());
        Ok(())
    }

    fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.tables()?.users.get(&id).cloned())
    }

    fn find_user_by_name(&self, name: &str) -> Result<Option<User>> {
        Ok(self
            .tables()?
            .users
            .values()
            .find(|u| u.name == name)
            .cloned())
    }

    fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.tables()?.users.values().cloned().collect())
    }

    fn insert_measurement(&self, measurement: &Measurement) -> Result<()> {
        check_storable(measurement.timestamp)?;
        let mut t = self.tables()?;
        if !t.devices.contains_key(&measurement.device_id) {
            return Err(Error::DeviceNotFound);
        }
        t.measurements.push(measurement.clone());
        Ok(())
    }

    fn query_measurements(&self, filter: &MeasurementFilter) -> Result<Vec<Measurement>> {
        let t = self.tables()?;
        let mut found: Vec<Measurement> = t
            .measurements
            .iter()
            .filter(|m| filter.device_ids.contains(&m.device_id))
            .filter(|m| filter.period.contains(m.timestamp))
            .cloned()
            .collect();

        found.sort_by(|a, b| (a.timestamp, a.id).cmp(&(b.timestamp, b.id)));
        if filter.order == TimeOrder::Descending {
            found.reverse();
        }
        Ok(found)
    }

    fn insert_link(&self, link: &UserDeviceLink) -> Result<()> {
        let mut t = self.tables()?;
        if !t.devices.contains_key(&link.device_id) {
            return Err(Error::DeviceNotFound);
        }
        if !t.users.contains_key(&link.user_id) {
            return Err(Error::UserNotFound);
        }
        if !t.links.insert((link.user_id, link.device_id)) {
            return Err(Error::UserAlreadyLinked);
        }
        Ok(())
    }

    fn link_exists(&self, link: &UserDeviceLink) -> Result<bool> {
        Ok(self
            .tables()?
            .links
            .contains(&(link.user_id, link.device_id)))
    }

    fn device_users(&self, device_id: Uuid) -> Result<Vec<User>> {
        let t = self.tables()?;
        let mut users: Vec<User> = t
            .links
            .iter()
            .filter(|(_, d)| *d == device_id)
            .filter_map(|(u, _)| t.users.get(u).cloned())
            .collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    fn user_devices(&self, user_id: Uuid) -> Result<Vec<Device>> {
        let t = self.tables()?;
        // Links are ordered by (user_id, device_id), so this is id order.
        Ok(t.links
            .iter()
            .filter(|(u, _)| *u == user_id)
            .filter_map(|(_, d)| t.devices.get(d).cloned())
            .collect())
    }

    fn counts(&self) -> Result<StoreCounts> {
        let t = self.tables()?;
        Ok(StoreCounts {
            users: t.users.len(),
            devices: t.devices.len(),
            measurements: t.measurements.len(),
            links: t.links.len(),
        })
    }
}
