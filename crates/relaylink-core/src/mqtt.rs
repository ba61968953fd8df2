//! MQTT-backed broker connector.

use crate::error::AgentError;
use crate::locator::{BrokerConnection, BrokerConnector};
use async_trait::async_trait;
use relaylink_discovery::BrokerEndpoint;
use relaylink_mqtt::{MqttClient, MqttOptions, QoS};
use tracing::debug;

/// Connects with [`MqttClient`] using fixed options
#[derive(Debug, Clone, Default)]
pub struct MqttConnector {
    options: MqttOptions,
}

impl MqttConnector {
    /// Create a connector using `options` for every attempt
    #[must_use]
    pub fn new(options: MqttOptions) -> Self {
        Self { options }
    }

    /// Options used for each attempt
    #[must_use]
    pub fn options(&self) -> &MqttOptions {
        &self.options
    }
}

#[async_trait]
impl BrokerConnector for MqttConnector {
    type Connection = MqttClient;

    async fn connect(&self, endpoint: BrokerEndpoint) -> Result<MqttClient, AgentError> {
        debug!(
            "MQTT connect to {} (client_id={}, timeout={:?})",
            endpoint, self.options.client_id, self.options.connect_timeout
        );
        Ok(MqttClient::connect(endpoint.socket_addr(), self.options.clone()).await?)
    }
}

#[async_trait]
impl BrokerConnection for MqttClient {
    fn is_connected(&self) -> bool {
        MqttClient::is_connected(self)
    }

    async fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: &[u8],
    ) -> Result<(), AgentError> {
        MqttClient::publish(self, topic, qos, retain, payload).await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AgentError> {
        Ok(MqttClient::disconnect(self).await?)
    }

    async fn closed(&self) {
        MqttClient::closed(self).await;
    }
}
