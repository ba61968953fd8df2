//! Broker discovery and connect-with-retry.
//!
//! The locator first runs the broadcast discovery exchange, then drives the
//! connection state machine:
//!
//! ```text
//! Disconnected ──► Connecting ──► Connected
//!                    ▲    │
//!                    │    ▼
//!                    └─ Failed   (after the retry interval)
//! ```
//!
//! There is no attempt cap. The only ways out are a live connection or a
//! shutdown request. When an established session drops, the owner marks the
//! locator `Disconnected` and runs [`BrokerLocator::connect`] again on the
//! same endpoint.

use crate::error::{AgentError, LocatorError};
use crate::retry::RetryPolicy;
use crate::shutdown::Shutdown;
use async_trait::async_trait;
use relaylink_discovery::{BrokerEndpoint, DiscoveryConfig};
use relaylink_mqtt::QoS;
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

/// Connection state as seen by the locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No attempt in progress
    Disconnected,
    /// Connect attempt `attempt` in progress
    Connecting {
        /// 1-based attempt number
        attempt: u32,
    },
    /// Broker confirmed the session
    Connected,
    /// Attempt `attempt` failed; waiting for the next one
    Failed {
        /// 1-based attempt number
        attempt: u32,
        /// Why the attempt failed
        reason: String,
    },
}

impl ConnectionState {
    /// Publishing is only permitted in this state
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting { attempt } => write!(f, "connecting (attempt {attempt})"),
            Self::Connected => write!(f, "connected"),
            Self::Failed { attempt, reason } => write!(f, "failed (attempt {attempt}): {reason}"),
        }
    }
}

/// Counters for the connect loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectMetrics {
    /// Connect calls made
    pub attempts: u32,
    /// Calls that failed or returned an unconnected session
    pub failures: u32,
    /// Time from the first attempt to the loop exiting
    pub elapsed: Duration,
    /// Reason for the most recent failure
    pub last_failure: Option<String>,
}

/// A live session with the broker
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// Whether the session is established
    fn is_connected(&self) -> bool;

    /// Publish one message
    async fn publish(&self, topic: &str, qos: QoS, retain: bool, payload: &[u8])
    -> Result<(), AgentError>;

    /// Close the session
    async fn disconnect(&self) -> Result<(), AgentError>;

    /// Resolves once the session is down, whether the broker dropped it or
    /// `disconnect` was called
    async fn closed(&self);
}

/// Opens sessions to a broker endpoint
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// Session type produced by this connector
    type Connection: BrokerConnection;

    /// Make one connect attempt
    async fn connect(&self, endpoint: BrokerEndpoint) -> Result<Self::Connection, AgentError>;
}

/// Finds the broker and connects to it
pub struct BrokerLocator<C: BrokerConnector> {
    discovery: DiscoveryConfig,
    connector: C,
    retry: RetryPolicy,
    state: watch::Sender<ConnectionState>,
    metrics: ConnectMetrics,
}

impl<C: BrokerConnector> BrokerLocator<C> {
    /// Create a locator with the default retry policy
    #[must_use]
    pub fn new(discovery: DiscoveryConfig, connector: C) -> Self {
        let (state, _rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            discovery,
            connector,
            retry: RetryPolicy::default(),
            state,
            metrics: ConnectMetrics::default(),
        }
    }

    /// Replace the retry policy
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Watch connection state changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Counters from the last connect loop
    #[must_use]
    pub fn metrics(&self) -> &ConnectMetrics {
        &self.metrics
    }

    /// Run discovery, then connect. See [`Self::discover`] and [`Self::connect`].
    ///
    /// # Errors
    ///
    /// Returns `LocatorError::Discovery` if discovery fails or
    /// `LocatorError::Cancelled` on shutdown.
    pub async fn locate(
        &mut self,
        shutdown: &Shutdown,
    ) -> Result<(BrokerEndpoint, C::Connection), LocatorError> {
        let endpoint = self.discover(shutdown).await?;
        let connection = self.connect(endpoint, shutdown).await?;
        Ok((endpoint, connection))
    }

    /// Run the discovery exchange.
    ///
    /// # Errors
    ///
    /// Returns `LocatorError::Discovery` for any discovery failure, or
    /// `LocatorError::Cancelled` if shutdown is requested first.
    pub async fn discover(&self, shutdown: &Shutdown) -> Result<BrokerEndpoint, LocatorError> {
        let mut signal = shutdown.signal();
        tokio::select! {
            biased;
            () = signal.wait() => {
                warn!("Discovery cancelled");
                Err(LocatorError::Cancelled)
            }
            result = relaylink_discovery::discover(&self.discovery) => Ok(result?),
        }
    }

    /// Connect to `endpoint`, retrying every failed attempt after the retry
    /// interval until a session is established.
    ///
    /// An attempt that returns a session which is not connected counts as a
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns `LocatorError::Cancelled` if shutdown is requested while an
    /// attempt or a retry wait is in progress.
    pub async fn connect(
        &mut self,
        endpoint: BrokerEndpoint,
        shutdown: &Shutdown,
    ) -> Result<C::Connection, LocatorError> {
        let mut signal = shutdown.signal();
        let started = Instant::now();
        self.metrics = ConnectMetrics::default();

        loop {
            let attempt = self.metrics.attempts + 1;
            self.metrics.attempts = attempt;
            self.set_state(ConnectionState::Connecting { attempt });
            debug!("Connecting to broker {} (attempt {})", endpoint, attempt);

            let outcome = tokio::select! {
                biased;
                () = signal.wait() => None,
                result = self.connector.connect(endpoint) => Some(result),
            };
            let Some(outcome) = outcome else {
                return Err(self.cancelled(started));
            };

            let reason = match outcome {
                Ok(connection) if connection.is_connected() => {
                    self.metrics.elapsed = started.elapsed();
                    self.set_state(ConnectionState::Connected);
                    info!(
                        "Connected to broker {} after {} attempt(s)",
                        endpoint, attempt
                    );
                    return Ok(connection);
                }
                Ok(_) => "connect returned without an established session".to_string(),
                Err(e) => e.to_string(),
            };

            error!(
                "Connect attempt {} to broker {} failed: {}",
                attempt, endpoint, reason
            );
            self.metrics.failures += 1;
            self.metrics.last_failure = Some(reason.clone());
            self.set_state(ConnectionState::Failed { attempt, reason });

            let delay = self.retry.backoff_duration(attempt);
            let cancelled = tokio::select! {
                biased;
                () = signal.wait() => true,
                () = time::sleep(delay) => false,
            };
            if cancelled {
                return Err(self.cancelled(started));
            }
        }
    }

    fn cancelled(&mut self, started: Instant) -> LocatorError {
        self.metrics.elapsed = started.elapsed();
        self.set_state(ConnectionState::Disconnected);
        warn!(
            "Connect loop cancelled after {} attempt(s)",
            self.metrics.attempts
        );
        LocatorError::Cancelled
    }

    /// Record that an established session dropped
    pub fn mark_disconnected(&self) {
        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

impl<C: BrokerConnector> fmt::Debug for BrokerLocator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerLocator")
            .field("discovery", &self.discovery)
            .field("retry", &self.retry)
            .field("state", &*self.state.borrow())
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}
