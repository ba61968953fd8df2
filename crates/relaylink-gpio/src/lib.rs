//! # relaylink GPIO
//!
//! Output-line layer for the relaylink agent.
//!
//! This crate provides:
//! - The `OutputDriver` trait abstracting a digital output controller
//! - A Linux sysfs driver (`/sys/class/gpio`)
//! - An in-memory driver for tests and bench-top runs
//! - `RelayBank`, which turns a comma-separated pin list into lines driven high
//!
//! ## Example
//!
//! ```rust
//! use relaylink_gpio::{Level, MemoryDriver, RelayBank};
//!
//! let driver = MemoryDriver::new();
//! let state = driver.state();
//! let bank = RelayBank::setup(Box::new(driver), "17,x,18").unwrap();
//!
//! assert_eq!(bank.pins(), vec![17, 18]);
//! assert_eq!(bank.errors().len(), 1);
//! assert_eq!(state.level(17), Some(Level::High));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bank;
pub mod driver;
pub mod error;
pub mod memory;
pub mod sysfs;

pub use bank::{RelayBank, RelayParseError, parse_relay_list};
pub use driver::{DriverKind, Level, OutputDriver, OutputHandle, open_driver};
pub use error::{GpioError, GpioResult};
pub use memory::{MemoryDriver, MemoryState};
pub use sysfs::{DEFAULT_SYSFS_ROOT, SysfsDriver};
