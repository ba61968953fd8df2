//! Error types for the agent
//!
//! `AgentError` unifies the per-crate errors so the startup sequence can
//! propagate anything with `?`. Errors are classified for the caller:
//!
//! - **Transient**: the operation may succeed if repeated (broker not up yet)
//! - **Fatal**: the process cannot continue (driver, socket, discovery,
//!   configuration failures)
//!
//! Cancellation is neither: it is the requested outcome of a shutdown.

use relaylink_discovery::DiscoveryError;
use relaylink_gpio::GpioError;
use relaylink_mqtt::MqttError;
use std::borrow::Cow;
use thiserror::Error;

/// Errors returned by the broker locator
#[derive(Debug, Error)]
pub enum LocatorError {
    /// Discovery failed
    #[error("Discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Shutdown was requested before a connection was established
    #[error("Cancelled")]
    Cancelled,
}

/// Agent errors
#[derive(Debug, Error)]
pub enum AgentError {
    /// Output driver or line failure
    #[error("GPIO error: {0}")]
    Gpio(#[from] GpioError),

    /// Broker discovery failed
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Messaging client failure
    #[error("MQTT error: {0}")]
    Mqtt(#[from] MqttError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(Cow<'static, str>),

    /// Shutdown was requested
    #[error("Cancelled")]
    Cancelled,
}

impl From<LocatorError> for AgentError {
    fn from(err: LocatorError) -> Self {
        match err {
            LocatorError::Discovery(e) => Self::Discovery(e),
            LocatorError::Cancelled => Self::Cancelled,
        }
    }
}

impl AgentError {
    /// Returns true if repeating the operation may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Mqtt(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Returns true if the process cannot continue
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !self.is_transient() && !self.is_cancelled()
    }

    /// Returns true for a requested shutdown
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Create an invalid configuration error with static context
    #[must_use]
    pub const fn invalid_config(context: &'static str) -> Self {
        Self::InvalidConfig(Cow::Borrowed(context))
    }
}

/// Result alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;
