//! Database repository layer
//!
//! SQLite implementation of [`Store`]. Each write is a single autocommitted
//! statement; uniqueness and foreign-key violations raised by SQLite are
//! translated into the matching domain errors, so the schema remains the
//! final word when two writers race past the services' existence checks.

use crate::error::{Error, Result};
use crate::store::{check_storable, Store, STORABLE_YEARS};
use crate::types::*;
use chrono::{DateTime, Datelike, Duration, SecondsFormat, Timelike, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable foreign keys (required for cascades) and WAL mode for better concurrency
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;

        tracing::debug!(path = %path.display(), "Opened database");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;
        super::schema::run_migrations(&conn)
    }

    /// Current schema version
    pub fn schema_version(&self) -> Result<i32> {
        let conn = self.conn()?;
        super::schema::get_schema_version(&conn)
    }

    /// Get the database file size in bytes.
    pub fn database_size(&self) -> Result<u64> {
        let conn = self.conn()?;

        let page_count: u64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: u64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;

        Ok(page_count * page_size)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::StorePoisoned)
    }

    fn row_to_device(row: &Row) -> rusqlite::Result<Device> {
        Ok(Device {
            id: parse_uuid(row, "id")?,
            serial_number: row.get("serial_number")?,
        })
    }

    fn row_to_user(row: &Row) -> rusqlite::Result<User> {
        Ok(User {
            id: parse_uuid(row, "id")?,
            name: row.get("name")?,
        })
    }

    fn row_to_measurement(row: &Row) -> rusqlite::Result<Measurement> {
        Ok(Measurement {
            id: parse_uuid(row, "id")?,
            device_id: parse_uuid(row, "device_id")?,
            timestamp: parse_timestamp(row, "timestamp")?,
            x: row.get("x")?,
            y: row.get("y")?,
            z: row.get("z")?,
        })
    }

    fn device_exists(conn: &Connection, id: Uuid) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM devices WHERE id = ?",
                [id.to_string()],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

impl Store for Database {
    // ============================================
    // Device operations
    // ============================================

    fn insert_device(&self, device: &Device) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO devices (id, serial_number) VALUES (?1, ?2)",
            params![device.id.to_string(), device.serial_number],
        )
        .map_err(|e| match constraint_kind(&e) {
            Some(ConstraintKind::Unique) => Error::DuplicateSerialNumber,
            _ => Error::from(e),
        })?;
        Ok(())
    }

    fn get_device(&self, id: Uuid) -> Result<Option<Device>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, serial_number FROM devices WHERE id = ?",
            [id.to_string()],
            Self::row_to_device,
        )
        .optional()
        .map_err(Error::from)
    }

    fn find_device_by_serial(&self, serial_number: &str) -> Result<Option<Device>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, serial_number FROM devices WHERE serial_number = ?",
            [serial_number],
            Self::row_to_device,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_devices(&self) -> Result<Vec<Device>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, serial_number FROM devices ORDER BY id")?;
        let devices = stmt
            .query_map([], Self::row_to_device)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(devices)
    }

    fn delete_device(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn()?;
        // Measurements and links go with it via ON DELETE CASCADE
        let deleted = conn.execute("DELETE FROM devices WHERE id = ?", [id.to_string()])?;
        Ok(deleted > 0)
    }

    // ============================================
    // User operations
    // ============================================

    fn insert_user(&self, user: &User) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (id, name) VALUES (?1, ?2)",
            params![user.id.to_string(), user.name],
        )
        .map_err(|e| match constraint_kind(&e) {
            Some(ConstraintKind::Unique) => Error::UserAlreadyExists,
            _ => Error::from(e),
        })?;
        Ok(())
    }

    fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name FROM users WHERE id = ?",
            [id.to_string()],
            Self::row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    fn find_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name FROM users WHERE name = ?",
            [name],
            Self::row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM users ORDER BY id")?;
        let users = stmt
            .query_map([], Self::row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    // ============================================
    // Measurement operations
    // ============================================

    fn insert_measurement(&self, measurement: &Measurement) -> Result<()> {
        check_storable(measurement.timestamp)?;
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO measurements (id, device_id, timestamp, x, y, z)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                measurement.id.to_string(),
                measurement.device_id.to_string(),
                format_timestamp(measurement.timestamp),
                measurement.x,
                measurement.y,
                measurement.z,
            ],
        )
        .map_err(|e| match constraint_kind(&e) {
            Some(ConstraintKind::ForeignKey) => Error::DeviceNotFound,
            _ => Error::from(e),
        })?;
        Ok(())
    }

    fn query_measurements(&self, filter: &MeasurementFilter) -> Result<Vec<Measurement>> {
        if filter.device_ids.is_empty() {
            return Ok(Vec::new());
        }

        let lower = match filter.period.start.map(ceil_micros).map(bound_position) {
            Some(BoundPosition::After) => return Ok(Vec::new()),
            Some(BoundPosition::Within(start)) => Some(start),
            Some(BoundPosition::Before) | None => None,
        };
        let upper = match filter.period.end.map(bound_position) {
            Some(BoundPosition::Before) => return Ok(Vec::new()),
            Some(BoundPosition::Within(end)) => Some(end),
            Some(BoundPosition::After) | None => None,
        };

        let conn = self.conn()?;

        let placeholders = vec!["?"; filter.device_ids.len()].join(", ");
        let mut sql = format!(
            "SELECT id, device_id, timestamp, x, y, z FROM measurements WHERE device_id IN ({})",
            placeholders
        );
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = filter
            .device_ids
            .iter()
            .map(|id| Box::new(id.to_string()) as Box<dyn rusqlite::ToSql>)
            .collect();

        if let Some(start) = lower {
            sql.push_str(" AND timestamp >= ?");
            params.push(Box::new(format_timestamp(start)));
        }

        if let Some(end) = upper {
            sql.push_str(" AND timestamp <= ?");
            params.push(Box::new(format_timestamp(end)));
        }

        match filter.order {
            TimeOrder::Ascending => sql.push_str(" ORDER BY timestamp ASC, id ASC"),
            TimeOrder::Descending => sql.push_str(" ORDER BY timestamp DESC, id DESC"),
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let measurements = stmt
            .query_map(params_refs.as_slice(), Self::row_to_measurement)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        tracing::debug!(
            devices = filter.device_ids.len(),
            found = measurements.len(),
            "Queried measurements"
        );

        Ok(measurements)
    }

    // ============================================
    // Link operations
    // ============================================

    fn insert_link(&self, link: &UserDeviceLink) -> Result<()> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO user_device_association (user_id, device_id) VALUES (?1, ?2)",
            params![link.user_id.to_string(), link.device_id.to_string()],
        );

        match inserted {
            Ok(_) => Ok(()),
            Err(e) => match constraint_kind(&e) {
                Some(ConstraintKind::Unique) => Err(Error::UserAlreadyLinked),
                Some(ConstraintKind::ForeignKey) => {
                    if Self::device_exists(&conn, link.device_id)? {
                        Err(Error::UserNotFound)
                    } else {
                        Err(Error::DeviceNotFound)
                    }
                }
                _ => Err(Error::from(e)),
            },
        }
    }

    fn link_exists(&self, link: &UserDeviceLink) -> Result<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM user_device_association WHERE user_id = ?1 AND device_id = ?2",
                params![link.user_id.to_string(), link.device_id.to_string()],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn device_users(&self, device_id: Uuid) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT u.id, u.name
            FROM users u
            JOIN user_device_association a ON a.user_id = u.id
            WHERE a.device_id = ?
            ORDER BY u.id
            "#,
        )?;
        let users = stmt
            .query_map([device_id.to_string()], Self::row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn user_devices(&self, user_id: Uuid) -> Result<Vec<Device>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT d.id, d.serial_number
            FROM devices d
            JOIN user_device_association a ON a.device_id = d.id
            WHERE a.user_id = ?
            ORDER BY d.id
            "#,
        )?;
        let devices = stmt
            .query_map([user_id.to_string()], Self::row_to_device)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(devices)
    }

    fn counts(&self) -> Result<StoreCounts> {
        let conn = self.conn()?;

        let count = |table: &str| -> Result<usize> {
            let n: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
            Ok(n as usize)
        };

        Ok(StoreCounts {
            users: count("users")?,
            devices: count("devices")?,
            measurements: count("measurements")?,
            links: count("user_device_association")?,
        })
    }
}

// ============================================
// Column codecs
// ============================================

/// Constraint families we translate into domain errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConstraintKind {
    /// UNIQUE or PRIMARY KEY
    Unique,
    ForeignKey,
}

fn constraint_kind(err: &rusqlite::Error) -> Option<ConstraintKind> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            match e.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => Some(ConstraintKind::Unique),
                rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(ConstraintKind::ForeignKey),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Fixed-width, microsecond-precision UTC text.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Round sub-microsecond remainders up.
///
/// Stored timestamps are microsecond-aligned, so a lower bound rounded up
/// admits exactly the rows at or after the original bound.
fn ceil_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    if ts.nanosecond() % 1_000 == 0 {
        ts
    } else {
        // Only fails at the calendar's end, which is past every store anyway
        ts.checked_add_signed(Duration::microseconds(1)).unwrap_or(ts)
    }
}

/// Where a period bound falls relative to the storable years.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundPosition {
    /// Earlier than any stored timestamp
    Before,
    /// Comparable as text against stored timestamps
    Within(DateTime<Utc>),
    /// Later than any stored timestamp
    After,
}

fn bound_position(ts: DateTime<Utc>) -> BoundPosition {
    if ts.year() < *STORABLE_YEARS.start() {
        BoundPosition::Before
    } else if ts.year() > *STORABLE_YEARS.end() {
        BoundPosition::After
    } else {
        BoundPosition::Within(ts)
    }
}

fn parse_timestamp(row: &Row, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(row, column, e))
}

fn parse_uuid(row: &Row, column: &str) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(column)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(row, column, e))
}

fn conversion_error<E>(row: &Row, column: &str, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let index = row.as_ref().column_index(column).unwrap_or(0);
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn create_test_device(serial: &str) -> Device {
        Device {
            id: Uuid::now_v7(),
            serial_number: serial.to_string(),
        }
    }

    fn create_test_user(name: &str) -> User {
        User {
            id: Uuid::now_v7(),
            name: name.to_string(),
        }
    }

    fn create_test_measurement(device_id: Uuid, ts: DateTime<Utc>, x: f64) -> Measurement {
        Measurement {
            id: Uuid::now_v7(),
            device_id,
            timestamp: ts,
            x,
            y: x * 2.0,
            z: -x,
        }
    }

    #[test]
    fn test_device_crud() {
        let db = test_db();
        let device = create_test_device("SN-001");

        db.insert_device(&device).unwrap();

        let retrieved = db.get_device(device.id).unwrap().unwrap();
        assert_eq!(retrieved, device);

        let by_serial = db.find_device_by_serial("SN-001").unwrap().unwrap();
        assert_eq!(by_serial.id, device.id);

        assert_eq!(db.list_devices().unwrap().len(), 1);
        assert!(db.get_device(Uuid::now_v7()).unwrap().is_none());
    }

    #[test]
    fn test_unique_constraints_map_to_domain_errors() {
        let db = test_db();
        db.insert_device(&create_test_device("SN-001")).unwrap();
        let err = db.insert_device(&create_test_device("SN-001")).unwrap_err();
        assert!(matches!(err, Error::DuplicateSerialNumber));

        db.insert_user(&create_test_user("ada")).unwrap();
        let err = db.insert_user(&create_test_user("ada")).unwrap_err();
        assert!(matches!(err, Error::UserAlreadyExists));
    }

    #[test]
    fn test_link_constraints() {
        let db = test_db();
        let device = create_test_device("SN-001");
        let user = create_test_user("ada");
        db.insert_device(&device).unwrap();
        db.insert_user(&user).unwrap();

        let link = UserDeviceLink {
            user_id: user.id,
            device_id: device.id,
        };
        assert!(!db.link_exists(&link).unwrap());
        db.insert_link(&link).unwrap();
        assert!(db.link_exists(&link).unwrap());

        let err = db.insert_link(&link).unwrap_err();
        assert!(matches!(err, Error::UserAlreadyLinked));

        let dangling_user = UserDeviceLink {
            user_id: Uuid::now_v7(),
            device_id: device.id,
        };
        assert!(matches!(
            db.insert_link(&dangling_user).unwrap_err(),
            Error::UserNotFound
        ));

        let dangling_device = UserDeviceLink {
            user_id: user.id,
            device_id: Uuid::now_v7(),
        };
        assert!(matches!(
            db.insert_link(&dangling_device).unwrap_err(),
            Error::DeviceNotFound
        ));

        assert_eq!(db.device_users(device.id).unwrap(), vec![user.clone()]);
        assert_eq!(db.user_devices(user.id).unwrap(), vec![device]);
    }

    #[test]
    fn test_measurement_requires_device() {
        let db = test_db();
        let err = db
            .insert_measurement(&create_test_measurement(Uuid::now_v7(), Utc::now(), 1.0))
            .unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound));
    }

    #[test]
    fn test_measurement_query_period_and_order() {
        let db = test_db();
        let device = create_test_device("SN-001");
        db.insert_device(&device).unwrap();

        let base = Utc.with_ymd_and_hms(2025, 4, 11, 2, 0, 0).unwrap();
        for i in 0..5 {
            db.insert_measurement(&create_test_measurement(
                device.id,
                base + Duration::minutes(i),
                i as f64,
            ))
            .unwrap();
        }

        let all = db
            .query_measurements(&MeasurementFilter::for_device(device.id, Period::all()))
            .unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].timestamp, base);
        assert_eq!(all[0].y, 0.0);

        let window = Period::new(
            Some(base + Duration::minutes(1)),
            Some(base + Duration::minutes(3)),
        );
        let newest_first = db
            .query_measurements(&MeasurementFilter::for_device(device.id, window).newest_first())
            .unwrap();
        let xs: Vec<f64> = newest_first.iter().map(|m| m.x).collect();
        assert_eq!(xs, vec![3.0, 2.0, 1.0]);

        let open_start = Period::new(None, Some(base + Duration::minutes(1)));
        let early = db
            .query_measurements(&MeasurementFilter::for_device(device.id, open_start))
            .unwrap();
        assert_eq!(early.len(), 2);
    }

    #[test]
    fn test_sub_microsecond_lower_bound() {
        let db = test_db();
        let device = create_test_device("SN-001");
        db.insert_device(&device).unwrap();

        let ts = Utc.with_ymd_and_hms(2025, 4, 11, 2, 0, 0).unwrap();
        db.insert_measurement(&create_test_measurement(device.id, ts, 1.0))
            .unwrap();

        let just_after = ts + Duration::nanoseconds(500);
        let found = db
            .query_measurements(&MeasurementFilter::for_device(
                device.id,
                Period::new(Some(just_after), None),
            ))
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_delete_device_cascades() {
        let db = test_db();
        let device = create_test_device("SN-001");
        let user = create_test_user("ada");
        db.insert_device(&device).unwrap();
        db.insert_user(&user).unwrap();
        db.insert_link(&UserDeviceLink {
            user_id: user.id,
            device_id: device.id,
        })
        .unwrap();
        db.insert_measurement(&create_test_measurement(device.id, Utc::now(), 1.0))
            .unwrap();

        assert!(db.delete_device(device.id).unwrap());
        assert!(!db.delete_device(device.id).unwrap());

        let counts = db.counts().unwrap();
        assert_eq!(
            counts,
            StoreCounts {
                users: 1,
                devices: 0,
                measurements: 0,
                links: 0,
            }
        );
    }

    #[test]
    fn test_timestamp_format_is_fixed_width() {
        let ts = Utc.with_ymd_and_hms(2025, 4, 11, 2, 27, 36).unwrap();
        assert_eq!(format_timestamp(ts), "2025-04-11T02:27:36.000000Z");
        assert_eq!(
            format_timestamp(ceil_micros(ts + Duration::nanoseconds(1))),
            "2025-04-11T02:27:36.000001Z"
        );
    }

    #[test]
    fn test_bounds_beyond_storable_years() {
        let db = test_db();
        let device = create_test_device("SN-001");
        db.insert_device(&device).unwrap();
        let ts = Utc.with_ymd_and_hms(2025, 4, 11, 2, 0, 0).unwrap();
        db.insert_measurement(&create_test_measurement(device.id, ts, 1.0))
            .unwrap();

        let far_future = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        let far_past = Utc.with_ymd_and_hms(-1, 1, 1, 0, 0, 0).unwrap();
        let last_storable = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap()
            + Duration::nanoseconds(999_999_500);

        let count = |period: Period| {
            db.query_measurements(&MeasurementFilter::for_device(device.id, period))
                .unwrap()
                .len()
        };
        assert_eq!(count(Period::new(None, Some(far_future))), 1);
        assert_eq!(count(Period::new(Some(far_past), None)), 1);
        assert_eq!(count(Period::new(Some(far_past), Some(far_future))), 1);
        assert_eq!(count(Period::new(Some(far_future), None)), 0);
        assert_eq!(count(Period::new(None, Some(far_past))), 0);
        // Rounds up into year 10000
        assert_eq!(count(Period::new(Some(last_storable), None)), 0);

        assert_eq!(bound_position(far_future), BoundPosition::After);
        assert_eq!(bound_position(ts), BoundPosition::Within(ts));
    }

    #[test]
    fn test_measurement_outside_storable_years_rejected() {
        let db = test_db();
        let device = create_test_device("SN-001");
        db.insert_device(&device).unwrap();

        let far_future = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        let err = db
            .insert_measurement(&create_test_measurement(device.id, far_future, 1.0))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMeasurement(_)));
        assert_eq!(db.counts().unwrap().measurements, 0);
    }
}
