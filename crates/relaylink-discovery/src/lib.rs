//! # relaylink Discovery
//!
//! Locates the MQTT broker on the local network segment.
//!
//! The agent does not know the broker's address in advance. It broadcasts a
//! single-byte probe and takes the **source address** of the first datagram
//! that comes back as the broker host; the payload of the reply is logged but
//! never interpreted.
//!
//! ## Wire format
//!
//! | Direction | Transport | Address | Content |
//! |---|---|---|---|
//! | probe | UDP | `255.255.255.255:10001` | `0x01` |
//! | reply | UDP | back to local port `10002` | anything, ≤ 1024 bytes |
//!
//! The broker endpoint is `<reply source ip>:1883`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use relaylink_discovery::{DiscoveryConfig, discover};
//!
//! # async fn example() -> Result<(), relaylink_discovery::DiscoveryError> {
//! let config = DiscoveryConfig::default();
//! let broker = discover(&config).await?;
//! println!("broker at {broker}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod endpoint;
pub mod error;
pub mod probe;

pub use config::{
    DEFAULT_BROADCAST_ADDR, DEFAULT_BROKER_PORT, DEFAULT_LISTEN_ADDR, DiscoveryConfig,
    MAX_RESPONSE_SIZE, PROBE_PAYLOAD,
};
pub use endpoint::BrokerEndpoint;
pub use error::DiscoveryError;
pub use probe::{ProbeResponse, discover, probe_once};
