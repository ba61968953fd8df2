//! Discovery errors.
//!
//! Every variant is fatal to the discovery step. Only a receive timeout is
//! retried, and that happens inside `discover` before any error surfaces.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Discovery errors
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Malformed discovery address or parameter
    #[error("Invalid discovery configuration: {0}")]
    InvalidConfig(String),

    /// The local discovery socket could not be opened or bound
    #[error("Failed to bind discovery socket on {addr}: {source}")]
    Bind {
        /// Local address
        addr: SocketAddr,
        /// Source error
        #[source]
        source: io::Error,
    },

    /// The probe datagram could not be sent
    #[error("Failed to send probe to {addr}: {source}")]
    Send {
        /// Broadcast destination
        addr: SocketAddr,
        /// Source error
        #[source]
        source: io::Error,
    },

    /// The socket failed while waiting for a reply
    #[error("Failed to receive discovery reply: {0}")]
    Receive(#[source] io::Error),

    /// No reply arrived within the response timeout on any attempt
    #[error("No broker answered {attempts} discovery probe(s)")]
    NoResponse {
        /// Number of probes sent
        attempts: u32,
    },
}
