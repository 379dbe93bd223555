//! Error types for devicehub-core

use thiserror::Error;

/// Main error type for the devicehub-core library
///
/// The first six variants are the expected outcomes of data-access
/// operations; callers decide how to present them. The rest are
/// infrastructure failures.
#[derive(Error, Debug)]
pub enum Error {
    /// No device with the requested id
    #[error("Device not found")]
    DeviceNotFound,

    /// A device with this serial number is already registered
    #[error("Device with this serial number already exists")]
    DuplicateSerialNumber,

    /// No measurements matched the device and period
    #[error("No measurements found for the specified period")]
    MeasurementNotFound,

    /// No user with the requested id
    #[error("User not found")]
    UserNotFound,

    /// A user with this name already exists
    #[error("User already exists")]
    UserAlreadyExists,

    /// The user is already linked to the device
    #[error("User already assigned to this device")]
    UserAlreadyLinked,

    /// Reading rejected at ingestion (NaN or infinite axis value)
    #[error("invalid measurement: {0}")]
    InvalidMeasurement(String),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A store lock was poisoned by a panicking holder
    #[error("store lock poisoned")]
    StorePoisoned,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Logging setup error
    #[error("logging error: {0}")]
    Logging(#[from] tracing_appender::rolling::InitError),
}

impl Error {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::DeviceNotFound => "DEVICE_NOT_FOUND",
            Error::DuplicateSerialNumber => "DUPLICATE_SERIAL_NUMBER",
            Error::MeasurementNotFound => "MEASUREMENT_NOT_FOUND",
            Error::UserNotFound => "USER_NOT_FOUND",
            Error::UserAlreadyExists => "USER_ALREADY_EXISTS",
            Error::UserAlreadyLinked => "USER_ALREADY_LINKED",
            Error::InvalidMeasurement(_) => "INVALID_MEASUREMENT",
            Error::Database(_) | Error::StorePoisoned => "STORAGE_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Logging(_) => "LOGGING_ERROR",
        }
    }

    /// True for outcomes a caller is expected to handle (missing entities,
    /// conflicts, rejected input), false for infrastructure failures.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Error::DeviceNotFound
                | Error::DuplicateSerialNumber
                | Error::MeasurementNotFound
                | Error::UserNotFound
                | Error::UserAlreadyExists
                | Error::UserAlreadyLinked
                | Error::InvalidMeasurement(_)
        )
    }

    /// True for the "does not exist" family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::DeviceNotFound | Error::MeasurementNotFound | Error::UserNotFound
        )
    }

    /// True for uniqueness conflicts.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Error::DuplicateSerialNumber | Error::UserAlreadyExists | Error::UserAlreadyLinked
        )
    }
}

/// Result type alias for devicehub-core
pub type Result<T> = std::result::Result<T, Error>;
