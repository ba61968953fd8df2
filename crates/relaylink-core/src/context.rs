//! Runtime state shared by the agent once startup completes.

use crate::error::{AgentError, LocatorError, Result};
use crate::locator::{BrokerConnection, BrokerConnector, BrokerLocator, ConnectMetrics, ConnectionState};
use crate::shutdown::Shutdown;
use relaylink_discovery::BrokerEndpoint;
use relaylink_gpio::RelayBank;
use relaylink_mqtt::{PublishPacket, QoS};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Default announcement topic
pub const DEFAULT_ANNOUNCE_TOPIC: &str = "testChannel/Topic";

/// Default announcement payload
pub const DEFAULT_ANNOUNCE_PAYLOAD: &str = "testMessage";

/// Message published once the broker connection is up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Topic name
    pub topic: String,
    /// Payload
    pub payload: String,
    /// Delivery guarantee
    pub qos: QoS,
    /// Retain flag
    pub retain: bool,
}

impl Default for Announcement {
    fn default() -> Self {
        Self {
            topic: DEFAULT_ANNOUNCE_TOPIC.to_string(),
            payload: DEFAULT_ANNOUNCE_PAYLOAD.to_string(),
            qos: QoS::AtLeastOnce,
            retain: false,
        }
    }
}

impl Announcement {
    /// Check the topic and QoS can be published
    ///
    /// # Errors
    /// Returns `AgentError::InvalidConfig` for wildcard or empty topics and
    /// for QoS 2.
    pub fn validate(&self) -> Result<()> {
        if PublishPacket::validate_topic(&self.topic).is_err() {
            return Err(AgentError::invalid_config(
                "announcement topic must be non-empty and free of wildcards",
            ));
        }
        if self.qos == QoS::ExactlyOnce {
            return Err(AgentError::invalid_config("announcement QoS must be 0 or 1"));
        }
        Ok(())
    }
}

/// Initialized relays plus the live broker session
///
/// The context keeps the locator that produced the session so it can
/// reconnect to the same broker when the session drops. Dropping the context
/// releases the output driver.
pub struct AppContext<C: BrokerConnector> {
    relays: RelayBank,
    broker: BrokerEndpoint,
    connection: C::Connection,
    locator: BrokerLocator<C>,
}

impl<C: BrokerConnector> AppContext<C> {
    /// Bundle startup results
    #[must_use]
    pub fn new(
        relays: RelayBank,
        broker: BrokerEndpoint,
        connection: C::Connection,
        locator: BrokerLocator<C>,
    ) -> Self {
        Self {
            relays,
            broker,
            connection,
            locator,
        }
    }

    /// Initialized relay lines
    #[must_use]
    pub fn relays(&self) -> &RelayBank {
        &self.relays
    }

    /// Mutable access for driving relay lines
    pub fn relays_mut(&mut self) -> &mut RelayBank {
        &mut self.relays
    }

    /// Discovered broker endpoint
    #[must_use]
    pub fn broker(&self) -> BrokerEndpoint {
        self.broker
    }

    /// Broker session
    #[must_use]
    pub fn connection(&self) -> &C::Connection {
        &self.connection
    }

    /// Counters from the most recent connect loop
    #[must_use]
    pub fn metrics(&self) -> &ConnectMetrics {
        self.locator.metrics()
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.locator.state()
    }

    /// Watch connection state changes, including reconnects
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.locator.subscribe()
    }

    /// Publish `announcement` on the broker session
    ///
    /// # Errors
    /// Returns the validation or publish error.
    pub async fn announce(&self, announcement: &Announcement) -> Result<()> {
        announcement.validate()?;
        self.connection
            .publish(
                &announcement.topic,
                announcement.qos,
                announcement.retain,
                announcement.payload.as_bytes(),
            )
            .await?;
        info!(
            "Announced {:?} on {:?} (qos={}, retain={})",
            announcement.payload, announcement.topic, announcement.qos, announcement.retain
        );
        Ok(())
    }

    /// Keep the broker session up until `shutdown` fires.
    ///
    /// When the session drops, the state goes to `Disconnected` and the
    /// connect loop runs again against the same broker, with the same retry
    /// interval. Returns once shutdown is requested, whether the session is
    /// up or a reconnect is in progress.
    ///
    /// # Errors
    /// Returns the locator error if reconnecting fails for a reason other
    /// than shutdown.
    pub async fn hold(&mut self, shutdown: &Shutdown) -> Result<()> {
        let mut signal = shutdown.signal();
        loop {
            tokio::select! {
                biased;
                () = signal.wait() => return Ok(()),
                () = self.connection.closed() => {}
            }

            error!("Lost broker session with {}, reconnecting", self.broker);
            self.locator.mark_disconnected();

            match self.locator.connect(self.broker, shutdown).await {
                Ok(connection) => {
                    self.connection = connection;
                    info!(
                        "Broker session with {} restored after {} attempt(s)",
                        self.broker,
                        self.locator.metrics().attempts
                    );
                }
                Err(LocatorError::Cancelled) => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Disconnect from the broker and release the output driver.
    ///
    /// The driver is released even if the disconnect fails.
    ///
    /// # Errors
    /// Returns the first error encountered.
    pub async fn close(mut self) -> Result<()> {
        let disconnected = self.connection.disconnect().await;
        if let Err(e) = &disconnected {
            warn!("Broker disconnect failed: {}", e);
        }
        self.relays.close()?;
        disconnected
    }
}

impl<C: BrokerConnector> std::fmt::Debug for AppContext<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("relays", &self.relays)
            .field("broker", &self.broker)
            .field("connected", &self.connection.is_connected())
            .field("locator", &self.locator)
            .finish()
    }
}
