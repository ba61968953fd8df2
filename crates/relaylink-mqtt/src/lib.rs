//! # relaylink MQTT
//!
//! A small MQTT 3.1.1 client: enough of the protocol for an agent that
//! connects, publishes status messages and keeps the session alive.
//!
//! Supported packets: CONNECT, CONNACK, PUBLISH (QoS 0 and 1), PUBACK,
//! PINGREQ, PINGRESP, DISCONNECT.
//!
//! ## Example
//!
//! ```rust,no_run
//! use relaylink_mqtt::{MqttClient, MqttOptions, QoS};
//!
//! # async fn example() -> Result<(), relaylink_mqtt::MqttError> {
//! let client = MqttClient::connect("10.0.0.5:1883".parse().unwrap(), MqttOptions::default()).await?;
//! client.publish("testChannel/Topic", QoS::AtLeastOnce, false, b"testMessage").await?;
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod error;
pub mod packet;
pub mod qos;

pub use client::{MqttClient, MqttOptions};
pub use error::{MqttError, PacketError};
pub use packet::{
    ConnAckPacket, ConnectPacket, ConnectReturnCode, Packet, PacketType, PubAckPacket,
    PublishPacket, MAX_INBOUND_PACKET, read_packet, read_packet_limited,
};
pub use qos::QoS;
