//! devicehub - command line front end for the device and measurement store
//!
//! Every command prints one JSON document on stdout. Failures print a JSON
//! error envelope on stderr and exit with a status that identifies the
//! failure class (2 invalid input, 3 conflict, 4 not found, 1 other).
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/devicehub/devicehub.db (~/.local/share/devicehub/devicehub.db)
//! - Config: $XDG_CONFIG_HOME/devicehub/config.toml (~/.config/devicehub/config.toml)
//! - Logs: $XDG_STATE_HOME/devicehub/ (~/.local/state/devicehub/)

mod input;
mod output;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::error::ErrorKind;
use clap::{Args as ClapArgs, Parser, Subcommand};
use devicehub_core::{logging, Config, Database, DeviceService, Period, Reading, UserService};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "devicehub")]
#[command(about = "Manage devices, their users and x/y/z measurements")]
#[command(version)]
struct Args {
    /// Database file (overrides config and the XDG default)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Config file (defaults to the XDG config path)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Device operations
    #[command(subcommand)]
    Device(DeviceCommand),

    /// User operations
    #[command(subcommand)]
    User(UserCommand),

    /// Show database location, schema version and record counts
    Status,
}

#[derive(Subcommand)]
enum DeviceCommand {
    /// Register a device under a new id
    Register {
        /// Serial number (3-30 characters, unique)
        #[arg(value_parser = input::serial_number)]
        serial_number: String,
    },

    /// Show a device with its linked users
    Get { device_id: Uuid },

    /// List all devices
    List,

    /// Delete a device with its measurements and user links
    Delete { device_id: Uuid },

    /// Record an x/y/z reading, timestamped now
    Measure {
        device_id: Uuid,
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
        #[arg(allow_negative_numbers = true)]
        z: f64,
    },

    /// List measurements in a period, newest first
    Measurements {
        device_id: Uuid,
        #[command(flatten)]
        period: PeriodArgs,
    },

    /// Per-axis statistics over a period
    Stats {
        device_id: Uuid,
        #[command(flatten)]
        period: PeriodArgs,
    },

    /// Link a user to a device
    Link { device_id: Uuid, user_id: Uuid },

    /// List the users linked to a device
    Users { device_id: Uuid },
}

#[derive(Subcommand)]
enum UserCommand {
    /// Create a user under a new id
    Create {
        /// User name (2-100 characters, unique)
        #[arg(value_parser = input::user_name)]
        name: String,
    },

    /// Show a user with their linked devices
    Get { user_id: Uuid },

    /// List all users
    List,

    /// Statistics over all of a user's devices
    Stats {
        user_id: Uuid,
        #[command(flatten)]
        period: PeriodArgs,

        /// Report each device separately instead of one aggregate
        #[arg(long)]
        per_device: bool,
    },
}

#[derive(ClapArgs)]
struct PeriodArgs {
    /// Inclusive lower bound (RFC3339)
    #[arg(long, value_parser = input::timestamp)]
    start: Option<DateTime<Utc>>,

    /// Inclusive upper bound (RFC3339)
    #[arg(long, value_parser = input::timestamp)]
    end: Option<DateTime<Utc>>,
}

impl From<PeriodArgs> for Period {
    fn from(args: PeriodArgs) -> Self {
        Period::new(args.start, args.end)
    }
}

/// Services shared by every command, built once per invocation.
struct App {
    db: Arc<Database>,
    db_path: PathBuf,
    devices: DeviceService<Database>,
    users: UserService<Database>,
}

#[derive(Serialize)]
struct StatusReport {
    database: PathBuf,
    database_size_bytes: u64,
    schema_version: i32,
    log_dir: PathBuf,
    counts: devicehub_core::StoreCounts,
}

#[derive(Serialize)]
struct Deleted {
    id: Uuid,
    deleted: bool,
}

fn main() -> Result<ExitCode> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            eprintln!(
                "{}",
                output::envelope("INVALID_INPUT", err.render().to_string().trim().to_string())
            );
            return Ok(ExitCode::from(output::EXIT_INVALID_INPUT));
        }
    };

    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load config")?;

    let _log_guard = logging::init(&config.logging).context("failed to initialize logging")?;

    let db_path = args
        .db
        .clone()
        .unwrap_or_else(|| config.resolved_database_path());
    let app = App::open(db_path, &config)?;

    tracing::debug!(database = %app.db_path.display(), "Dispatching command");

    let outcome = match args.command {
        Command::Device(cmd) => app.run_device(cmd),
        Command::User(cmd) => app.run_user(cmd),
        Command::Status => app.status(),
    };

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => match err.downcast::<devicehub_core::Error>() {
            Ok(domain) => {
                if !domain.is_expected() {
                    tracing::error!(error = %domain, "Command failed");
                }
                Ok(output::report(&domain))
            }
            Err(other) => Err(other),
        },
    }
}

impl App {
    fn open(db_path: PathBuf, config: &Config) -> Result<Self> {
        let db = Database::open(&db_path)
            .with_context(|| format!("failed to open database at {}", db_path.display()))?;
        db.migrate().context("failed to run migrations")?;

        let db = Arc::new(db);
        let devices = DeviceService::new(db.clone())
            .with_empty_list_error(config.devices.empty_list_is_error);
        let users = UserService::new(db.clone());

        Ok(Self {
            db,
            db_path,
            devices,
            users,
        })
    }

    fn run_device(&self, cmd: DeviceCommand) -> Result<()> {
        match cmd {
            DeviceCommand::Register { serial_number } => {
                output::print_json(&self.devices.register_device(&serial_number)?)
            }
            DeviceCommand::Get { device_id } => {
                output::print_json(&self.devices.get_device(device_id)?)
            }
            DeviceCommand::List => output::print_json(&self.devices.list_devices()?),
            DeviceCommand::Delete { device_id } => {
                self.devices.delete_device(device_id)?;
                output::print_json(&Deleted {
                    id: device_id,
                    deleted: true,
                })
            }
            DeviceCommand::Measure { device_id, x, y, z } => output::print_json(
                &self
                    .devices
                    .add_measurement(device_id, Reading::new(x, y, z))?,
            ),
            DeviceCommand::Measurements { device_id, period } => output::print_json(
                &self
                    .devices
                    .get_device_measurements(device_id, period.into())?,
            ),
            DeviceCommand::Stats { device_id, period } => {
                output::print_json(&self.devices.get_device_stats(device_id, period.into())?)
            }
            DeviceCommand::Link { device_id, user_id } => {
                output::print_json(&self.devices.add_user_to_device(device_id, user_id)?)
            }
            DeviceCommand::Users { device_id } => {
                output::print_json(&self.devices.get_device_users(device_id)?)
            }
        }
    }

    fn run_user(&self, cmd: UserCommand) -> Result<()> {
        match cmd {
            UserCommand::Create { name } => output::print_json(&self.users.create_user(&name)?),
            UserCommand::Get { user_id } => output::print_json(&self.users.get_user(user_id)?),
            UserCommand::List => output::print_json(&self.users.list_users()?),
            UserCommand::Stats {
                user_id,
                period,
                per_device,
            } => {
                let period = period.into();
                if per_device {
                    output::print_json(&self.users.get_user_devices_stats(user_id, period)?)
                } else {
                    output::print_json(&self.users.get_user_aggregated_stats(user_id, period)?)
                }
            }
        }
    }

    fn status(&self) -> Result<()> {
        let report = StatusReport {
            database: self.db_path.clone(),
            database_size_bytes: self.db.database_size()?,
            schema_version: self.db.schema_version()?,
            log_dir: logging::log_dir(),
            counts: devicehub_core::Store::counts(self.db.as_ref())?,
        };
        output::print_json(&report)
    }
}
