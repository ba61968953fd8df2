//! # relaylink Core
//!
//! Startup orchestration for the relaylink agent.
//!
//! This crate provides:
//! - `BrokerLocator`: broadcast discovery followed by a fixed-interval
//!   connect-retry loop with observable state and metrics
//! - The `BrokerConnector` / `BrokerConnection` seam, with an MQTT
//!   implementation
//! - `Shutdown` for cancelling discovery and the retry loop
//! - `AppContext`, bundling relays and the broker session and reconnecting
//!   when the session drops
//! - `start`, running the whole sequence
//!
//! ## Startup
//!
//! ```text
//! RelayBank::setup ──► discover ──► connect (retry every 2 s) ──► announce
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use relaylink_core::{AgentConfig, MqttConnector, Shutdown, start};
//! use relaylink_gpio::MemoryDriver;
//!
//! # async fn example() -> relaylink_core::Result<()> {
//! let config = AgentConfig {
//!     relays: "17,18".to_string(),
//!     ..AgentConfig::default()
//! };
//! let ctx = start(&config, Box::new(MemoryDriver::new()), MqttConnector::default(), &Shutdown::new()).await?;
//! ctx.close().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod agent;
pub mod context;
pub mod error;
pub mod locator;
pub mod mqtt;
pub mod retry;
pub mod shutdown;

pub use agent::{AgentConfig, start};
pub use context::{Announcement, AppContext, DEFAULT_ANNOUNCE_PAYLOAD, DEFAULT_ANNOUNCE_TOPIC};
pub use error::{AgentError, LocatorError, Result};
pub use locator::{BrokerConnection, BrokerConnector, BrokerLocator, ConnectMetrics, ConnectionState};
pub use mqtt::MqttConnector;
pub use retry::{DEFAULT_RETRY_INTERVAL, RetryPolicy};
pub use shutdown::{Shutdown, ShutdownSignal};
