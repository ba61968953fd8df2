//! Output driver abstraction.
//!
//! An `OutputDriver` owns the hardware interface for the whole process. It is
//! opened once, hands out `OutputHandle`s for configured lines, and is closed
//! exactly once by its owner.

use crate::error::GpioResult;
use crate::memory::MemoryDriver;
use crate::sysfs::SysfsDriver;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Logic level of an output line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Driven low (0)
    Low,
    /// Driven high (1)
    High,
}

impl Level {
    /// Value written to a line's control file
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "0",
            Self::High => "1",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Handle to a line that has been configured as an output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputHandle {
    pin: u32,
}

impl OutputHandle {
    /// Handle for `pin`; drivers hand these out from `configure_output`
    #[must_use]
    pub fn new(pin: u32) -> Self {
        Self { pin }
    }

    /// Pin index this handle drives
    #[must_use]
    pub fn pin(&self) -> u32 {
        self.pin
    }
}

/// Digital output controller.
///
/// Implementations must tolerate `configure_output` being called again for a
/// pin that is already configured (reacquiring a handle).
pub trait OutputDriver: Send {
    /// Configure `pin` as an output and return its handle
    ///
    /// # Errors
    /// Returns `GpioError` if the line cannot be claimed or switched to output mode
    fn configure_output(&mut self, pin: u32) -> GpioResult<OutputHandle>;

    /// Drive a line to the given level
    ///
    /// # Errors
    /// Returns `GpioError` if the level cannot be written
    fn write(&mut self, handle: OutputHandle, level: Level) -> GpioResult<()>;

    /// Drive a line high
    ///
    /// # Errors
    /// Returns `GpioError` if the level cannot be written
    fn set_high(&mut self, handle: OutputHandle) -> GpioResult<()> {
        self.write(handle, Level::High)
    }

    /// Drive a line low
    ///
    /// # Errors
    /// Returns `GpioError` if the level cannot be written
    fn set_low(&mut self, handle: OutputHandle) -> GpioResult<()> {
        self.write(handle, Level::Low)
    }

    /// Release the driver. Calling `close` twice is a no-op.
    ///
    /// # Errors
    /// Returns `GpioError` if releasing the interface fails
    fn close(&mut self) -> GpioResult<()>;

    /// Whether `close` has been called
    fn is_closed(&self) -> bool;

    /// Short driver name for logging
    fn name(&self) -> &'static str;
}

/// Driver selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Linux sysfs GPIO interface
    #[default]
    Sysfs,
    /// In-process driver with no hardware side effects
    Memory,
}

impl std::str::FromStr for DriverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sysfs" => Ok(Self::Sysfs),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown driver '{other}' (expected sysfs or memory)")),
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sysfs => write!(f, "sysfs"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Open a driver of the given kind.
///
/// `sysfs_root` and `chip_base` are only used by the sysfs driver; see
/// [`SysfsDriver::with_chip_base`].
///
/// # Errors
/// Returns `GpioError::OpenFailed` if the driver cannot be opened
pub fn open_driver(
    kind: DriverKind,
    sysfs_root: &Path,
    chip_base: u32,
) -> GpioResult<Box<dyn OutputDriver>> {
    match kind {
        DriverKind::Sysfs => Ok(Box::new(
            SysfsDriver::open(sysfs_root)?.with_chip_base(chip_base),
        )),
        DriverKind::Memory => Ok(Box::new(MemoryDriver::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_kind_parse() {
        assert_eq!("sysfs".parse::<DriverKind>().unwrap(), DriverKind::Sysfs);
        assert_eq!("Memory".parse::<DriverKind>().unwrap(), DriverKind::Memory);
        assert!("mmap".parse::<DriverKind>().is_err());
    }

    #[test]
    fn test_level_strings() {
        assert_eq!(Level::High.as_str(), "1");
        assert_eq!(Level::Low.as_str(), "0");
        assert_eq!(Level::High.to_string(), "high");
    }

    #[test]
    fn test_open_memory_driver() {
        let driver = open_driver(DriverKind::Memory, Path::new("/nonexistent"), 0).unwrap();
        assert_eq!(driver.name(), "memory");
        assert!(!driver.is_closed());
    }

    #[test]
    fn test_open_sysfs_driver_missing_root() {
        let result = open_driver(DriverKind::Sysfs, Path::new("/nonexistent/gpio"), 512);
        assert!(result.is_err());
    }
}
