//! Data-access operations for devicehub
//!
//! [`DeviceService`] and [`UserService`] implement the request-level
//! operations (existence checks, filtering, stats orchestration) over any
//! [`Store`](crate::store::Store). Construct one of each per process (or per
//! test) and pass them to whatever handles requests:
//!
//! ```rust,no_run
//! use devicehub_core::{Database, DeviceService, UserService};
//! use std::sync::Arc;
//!
//! let db = Arc::new(Database::open_in_memory().expect("open"));
//! db.migrate().expect("migrate");
//!
//! let devices = DeviceService::new(db.clone());
//! let users = UserService::new(db);
//! let device = devices.register_device("SN-0001").expect("register");
//! let user = users.create_user("ada").expect("create");
//! devices.add_user_to_device(device.id, user.id).expect("link");
//! ```

pub mod devices;
pub mod users;

pub use devices::DeviceService;
pub use users::{UserMeasurements, UserService};
