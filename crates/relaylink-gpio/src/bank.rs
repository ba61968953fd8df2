//! Relay bank setup.
//!
//! Turns a comma-separated list of pin indices into output lines driven high.
//! Malformed tokens are recorded and skipped; they never prevent the valid
//! tokens around them from being initialized.

use crate::driver::{Level, OutputDriver, OutputHandle};
use crate::error::{GpioError, GpioResult};
use std::collections::BTreeMap;
use std::fmt;
use std::num::ParseIntError;
use tracing::{debug, error, info, warn};

/// A relay token that could not be parsed as a pin index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayParseError {
    /// Zero-based position of the token in the list
    pub position: usize,
    /// The raw token
    pub token: String,
    /// Parse failure
    pub reason: ParseIntError,
}

impl fmt::Display for RelayParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "relay token #{} {:?} is not a pin index: {}",
            self.position, self.token, self.reason
        )
    }
}

impl std::error::Error for RelayParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.reason)
    }
}

/// Split a relay list into pin indices and per-token errors.
///
/// Tokens are trimmed before parsing. An empty or whitespace-only list has no
/// tokens at all; an empty token inside a non-empty list is an error.
#[must_use]
pub fn parse_relay_list(list: &str) -> (Vec<u32>, Vec<RelayParseError>) {
    let mut pins = Vec::new();
    let mut errors = Vec::new();

    if list.trim().is_empty() {
        return (pins, errors);
    }

    for (position, token) in list.split(',').enumerate() {
        match token.trim().parse::<u32>() {
            Ok(pin) => pins.push(pin),
            Err(reason) => errors.push(RelayParseError {
                position,
                token: token.to_string(),
                reason,
            }),
        }
    }

    (pins, errors)
}

/// Set of output lines owned for the process lifetime.
///
/// The bank owns the driver and closes it exactly once: on `close`, or on
/// drop if `close` was never called (including while unwinding).
pub struct RelayBank {
    driver: Box<dyn OutputDriver>,
    lines: BTreeMap<u32, OutputHandle>,
    errors: Vec<RelayParseError>,
}

impl RelayBank {
    /// Initialize every valid pin in `relays` as an output driven high.
    ///
    /// # Errors
    ///
    /// Returns `GpioError` if the driver fails to configure or drive a parsed
    /// line. The driver is released before the error is returned.
    pub fn setup(driver: Box<dyn OutputDriver>, relays: &str) -> GpioResult<Self> {
        debug!("Setting up relays {:?} on {} driver", relays, driver.name());

        let (pins, errors) = parse_relay_list(relays);
        for err in &errors {
            error!("{}", err);
        }

        let mut bank = Self {
            driver,
            lines: BTreeMap::new(),
            errors,
        };

        for pin in pins {
            if bank.lines.contains_key(&pin) {
                warn!("Relay {} listed more than once, already initialized", pin);
                continue;
            }
            let handle = bank.driver.configure_output(pin)?;
            bank.driver.set_high(handle)?;
            bank.lines.insert(pin, handle);
        }

        info!(
            "Relays ready: {} line(s) high, {} token(s) skipped",
            bank.lines.len(),
            bank.errors.len()
        );
        Ok(bank)
    }

    /// Initialized pins in ascending order
    #[must_use]
    pub fn pins(&self) -> Vec<u32> {
        self.lines.keys().copied().collect()
    }

    /// Number of initialized lines
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether no line was initialized
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Tokens skipped during setup
    #[must_use]
    pub fn errors(&self) -> &[RelayParseError] {
        &self.errors
    }

    /// Handle for an initialized pin
    #[must_use]
    pub fn handle(&self, pin: u32) -> Option<OutputHandle> {
        self.lines.get(&pin).copied()
    }

    /// Drive an initialized line to `level`
    ///
    /// # Errors
    /// Returns `GpioError::NotConfigured` if `pin` is not part of the bank
    pub fn write(&mut self, pin: u32, level: Level) -> GpioResult<()> {
        let handle = self.handle(pin).ok_or(GpioError::NotConfigured(pin))?;
        self.driver.write(handle, level)
    }

    /// Drive an initialized line high
    ///
    /// # Errors
    /// Returns `GpioError` if the line is unknown or the write fails
    pub fn set_high(&mut self, pin: u32) -> GpioResult<()> {
        self.write(pin, Level::High)
    }

    /// Drive an initialized line low
    ///
    /// # Errors
    /// Returns `GpioError` if the line is unknown or the write fails
    pub fn set_low(&mut self, pin: u32) -> GpioResult<()> {
        self.write(pin, Level::Low)
    }

    /// Release the driver
    ///
    /// # Errors
    /// Returns `GpioError` if the driver fails to release
    pub fn close(&mut self) -> GpioResult<()> {
        self.driver.close()
    }
}

impl fmt::Debug for RelayBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayBank")
            .field("driver", &self.driver.name())
            .field("pins", &self.pins())
            .field("errors", &self.errors.len())
            .finish()
    }
}

impl Drop for RelayBank {
    fn drop(&mut self) {
        if self.driver.is_closed() {
            return;
        }
        if let Err(e) = self.driver.close() {
            error!("Failed to release {} driver: {}", self.driver.name(), e);
        }
    }
}
