//! Linux sysfs GPIO driver.
//!
//! Uses the `/sys/class/gpio` interface:
//! - `export` claims a line and creates `gpioN/`
//! - `gpioN/direction` selects `in` / `out`
//! - `gpioN/value` holds the level
//!
//! The `export` control file is held open for the driver's lifetime; opening
//! it is what fails when the process lacks privilege. Lines are left exported
//! on close so relays keep their level after the agent exits.
//!
//! sysfs uses global GPIO numbers. Relay pins are offsets on one chip, so the
//! driver adds the chip base: `gpio{base + pin}`. The base is 0 on older
//! Raspberry Pi kernels; since 6.6 the SoC chip sits at 512, so BCM17 is
//! `gpio529` there. See `gpiochipN/base` on the target.

use crate::driver::{Level, OutputDriver, OutputHandle};
use crate::error::{GpioError, GpioResult};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace};

/// Default sysfs GPIO root
pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/gpio";

/// Attempts to wait for udev to create `gpioN/` after an export
const EXPORT_POLL_ATTEMPTS: u32 = 20;

/// Delay between export polls
const EXPORT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// sysfs-backed output driver
#[derive(Debug)]
pub struct SysfsDriver {
    root: PathBuf,
    chip_base: u32,
    export: Option<File>,
}

impl SysfsDriver {
    /// Open the sysfs interface rooted at `root`
    ///
    /// # Errors
    /// Returns `GpioError::OpenFailed` if `root` is missing or `export` is not writable
    pub fn open(root: impl AsRef<Path>) -> GpioResult<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(GpioError::OpenFailed {
                driver: "sysfs",
                reason: format!("{} is not a directory", root.display()),
            });
        }

        let export = OpenOptions::new()
            .write(true)
            .open(root.join("export"))
            .map_err(|e| GpioError::OpenFailed {
                driver: "sysfs",
                reason: format!("{}: {e}", root.join("export").display()),
            })?;

        debug!("Opened sysfs GPIO at {}", root.display());
        Ok(Self {
            root,
            chip_base: 0,
            export: Some(export),
        })
    }

    /// Offset added to every pin to get its global sysfs number
    #[must_use]
    pub fn with_chip_base(mut self, chip_base: u32) -> Self {
        self.chip_base = chip_base;
        self
    }

    /// Chip base in use
    #[must_use]
    pub fn chip_base(&self) -> u32 {
        self.chip_base
    }

    /// Root directory of this driver
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn global_number(&self, pin: u32) -> GpioResult<u32> {
        self.chip_base.checked_add(pin).ok_or_else(|| GpioError::Line {
            pin,
            reason: format!("pin is out of range for chip base {}", self.chip_base),
        })
    }

    fn line_dir(&self, pin: u32) -> GpioResult<PathBuf> {
        Ok(self.root.join(format!("gpio{}", self.global_number(pin)?)))
    }

    fn export_line(&mut self, pin: u32) -> GpioResult<()> {
        let number = self.global_number(pin)?;
        let export_path = self.root.join("export");
        let export = self.export.as_mut().ok_or(GpioError::Closed)?;
        export
            .write_all(number.to_string().as_bytes())
            .map_err(|e| GpioError::io(&export_path, e))?;
        trace!("Exported gpio{} for pin {}", number, pin);

        let dir = self.line_dir(pin)?;
        for _ in 0..EXPORT_POLL_ATTEMPTS {
            if dir.is_dir() {
                return Ok(());
            }
            std::thread::sleep(EXPORT_POLL_INTERVAL);
        }

        Err(GpioError::Line {
            pin,
            reason: format!("{} did not appear after export", dir.display()),
        })
    }
}

impl OutputDriver for SysfsDriver {
    fn configure_output(&mut self, pin: u32) -> GpioResult<OutputHandle> {
        if self.export.is_none() {
            return Err(GpioError::Closed);
        }

        if !self.line_dir(pin)?.is_dir() {
            self.export_line(pin)?;
        }

        let direction = self.line_dir(pin)?.join("direction");
        fs::write(&direction, "out").map_err(|e| GpioError::io(&direction, e))?;
        trace!("gpio{} direction=out", pin);

        Ok(OutputHandle::new(pin))
    }

    fn write(&mut self, handle: OutputHandle, level: Level) -> GpioResult<()> {
        if self.export.is_none() {
            return Err(GpioError::Closed);
        }

        let value = self.line_dir(handle.pin())?.join("value");
        fs::write(&value, level.as_str()).map_err(|e| GpioError::io(&value, e))?;
        trace!("gpio{} value={}", handle.pin(), level);
        Ok(())
    }

    fn close(&mut self) -> GpioResult<()> {
        if self.export.take().is_some() {
            debug!("Closed sysfs GPIO at {}", self.root.display());
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.export.is_none()
    }

    fn name(&self) -> &'static str {
        "sysfs"
    }
}
