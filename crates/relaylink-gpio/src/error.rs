//! Error types for output drivers.

use std::io;
use std::path::PathBuf;

/// Output driver errors
#[derive(Debug, thiserror::Error)]
pub enum GpioError {
    /// The driver could not be opened (missing interface, no privilege, busy)
    #[error("Failed to open {driver} driver: {reason}")]
    OpenFailed {
        /// Driver name
        driver: &'static str,
        /// Underlying reason
        reason: String,
    },

    /// Operation attempted after the driver was closed
    #[error("Driver is closed")]
    Closed,

    /// A line could not be configured or driven
    #[error("Line {pin} failed: {reason}")]
    Line {
        /// Pin index
        pin: u32,
        /// Underlying reason
        reason: String,
    },

    /// The pin has not been configured as an output
    #[error("Line {0} is not configured as an output")]
    NotConfigured(u32),

    /// I/O error on a driver control file
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Control file path
        path: PathBuf,
        /// Source error
        #[source]
        source: io::Error,
    },
}

impl GpioError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for driver operations
pub type GpioResult<T> = Result<T, GpioError>;
