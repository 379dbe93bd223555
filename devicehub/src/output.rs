//! Rendering of command results and failures.
//!
//! Successful commands print one JSON document on stdout. Failures print an
//! `{"error": {"code", "message"}}` envelope on stderr and exit non-zero.

use devicehub_core::Error;
use serde::Serialize;
use std::process::ExitCode;

/// Exit status for rejected input.
pub const EXIT_INVALID_INPUT: u8 = 2;
/// Exit status for uniqueness conflicts.
pub const EXIT_CONFLICT: u8 = 3;
/// Exit status for missing devices, users or measurements.
pub const EXIT_NOT_FOUND: u8 = 4;
/// Exit status for anything else.
pub const EXIT_FAILURE: u8 = 1;

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Exit status for a domain error.
pub fn exit_code(err: &Error) -> u8 {
    if err.is_not_found() {
        EXIT_NOT_FOUND
    } else if err.is_conflict() {
        EXIT_CONFLICT
    } else if matches!(err, Error::InvalidMeasurement(_)) {
        EXIT_INVALID_INPUT
    } else {
        EXIT_FAILURE
    }
}

/// Serialize the error envelope for `code` and `message`.
pub fn envelope(code: &str, message: String) -> String {
    let envelope = ErrorEnvelope {
        error: ErrorBody { code, message },
    };
    serde_json::to_string(&envelope)
        .unwrap_or_else(|_| format!(r#"{{"error":{{"code":"{}"}}}}"#, code))
}

/// Report a domain error on stderr and return the matching exit status.
pub fn report(err: &Error) -> ExitCode {
    eprintln!("{}", envelope(err.code(), err.to_string()));
    ExitCode::from(exit_code(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&Error::DeviceNotFound), EXIT_NOT_FOUND);
        assert_eq!(exit_code(&Error::MeasurementNotFound), EXIT_NOT_FOUND);
        assert_eq!(exit_code(&Error::UserAlreadyLinked), EXIT_CONFLICT);
        assert_eq!(
            exit_code(&Error::InvalidMeasurement("x".into())),
            EXIT_INVALID_INPUT
        );
        assert_eq!(exit_code(&Error::StorePoisoned), EXIT_FAILURE);
    }

    #[test]
    fn test_envelope_shape() {
        let err = Error::UserNotFound;
        let parsed: serde_json::Value =
            serde_json::from_str(&envelope(err.code(), err.to_string())).unwrap();
        assert_eq!(parsed["error"]["code"], "USER_NOT_FOUND");
        assert_eq!(parsed["error"]["message"], "User not found");
    }
}
