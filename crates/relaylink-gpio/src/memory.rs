//! In-memory output driver.
//!
//! Records line modes and levels without touching hardware. The recorded
//! state is shared through `MemoryState`, which stays readable after the
//! driver itself has been moved into a `RelayBank` or dropped.

use crate::driver::{Level, OutputDriver, OutputHandle};
use crate::error::{GpioError, GpioResult};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    /// Configured lines and their current level (None until first write)
    lines: BTreeMap<u32, Option<Level>>,
    /// Pins whose configuration is rejected
    failing: HashSet<u32>,
    /// Number of times `close` actually released the driver
    close_count: u32,
}

/// Shared view of a `MemoryDriver`'s lines
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryState {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means a test thread panicked mid-write.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current level of a line, `None` if never configured or written
    #[must_use]
    pub fn level(&self, pin: u32) -> Option<Level> {
        self.lock().lines.get(&pin).copied().flatten()
    }

    /// Whether a line has been configured as an output
    #[must_use]
    pub fn is_output(&self, pin: u32) -> bool {
        self.lock().lines.contains_key(&pin)
    }

    /// All configured pins in ascending order
    #[must_use]
    pub fn pins(&self) -> Vec<u32> {
        self.lock().lines.keys().copied().collect()
    }

    /// How many times the driver was released
    #[must_use]
    pub fn close_count(&self) -> u32 {
        self.lock().close_count
    }
}

/// Driver that keeps line state in process memory
#[derive(Debug, Default)]
pub struct MemoryDriver {
    state: MemoryState,
    closed: bool,
}

impl MemoryDriver {
    /// Create a new driver with no configured lines
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a driver that reuses an existing state, as if reopening the
    /// same hardware after a previous owner released it.
    #[must_use]
    pub fn with_state(state: MemoryState) -> Self {
        Self {
            state,
            closed: false,
        }
    }

    /// Make `configure_output` fail for `pin`
    #[must_use]
    pub fn failing_pin(self, pin: u32) -> Self {
        self.state.lock().failing.insert(pin);
        self
    }

    /// Shared handle to this driver's line state
    #[must_use]
    pub fn state(&self) -> MemoryState {
        self.state.clone()
    }
}

impl OutputDriver for MemoryDriver {
    fn configure_output(&mut self, pin: u32) -> GpioResult<OutputHandle> {
        if self.closed {
            return Err(GpioError::Closed);
        }

        let mut inner = self.state.lock();
        if inner.failing.contains(&pin) {
            return Err(GpioError::Line {
                pin,
                reason: "line rejected by driver".to_string(),
            });
        }
        inner.lines.entry(pin).or_insert(None);
        Ok(OutputHandle::new(pin))
    }

    fn write(&mut self, handle: OutputHandle, level: Level) -> GpioResult<()> {
        if self.closed {
            return Err(GpioError::Closed);
        }

        let mut inner = self.state.lock();
        match inner.lines.get_mut(&handle.pin()) {
            Some(slot) => {
                *slot = Some(level);
                Ok(())
            }
            None => Err(GpioError::NotConfigured(handle.pin())),
        }
    }

    fn close(&mut self) -> GpioResult<()> {
        if !self.closed {
            self.closed = true;
            self.state.lock().close_count += 1;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
