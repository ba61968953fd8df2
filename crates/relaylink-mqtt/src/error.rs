//! MQTT client errors.

use crate::packet::ConnectReturnCode;
use std::io;
use thiserror::Error;

/// Packet encoding/decoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    /// Not enough bytes for a complete packet
    #[error("Incomplete packet")]
    IncompletePacket,

    /// Remaining length is longer than four bytes or exceeds the protocol limit
    #[error("Invalid remaining length encoding")]
    InvalidLengthEncoding,

    /// Unknown or unsupported packet type
    #[error("Invalid packet type: {0}")]
    InvalidPacketType(u8),

    /// Fixed-header flags not allowed for the packet type
    #[error("Invalid flags {flags:#06b} for packet type {packet_type}")]
    InvalidFlags {
        /// Packet type nibble
        packet_type: u8,
        /// Flag nibble
        flags: u8,
    },

    /// Invalid QoS level
    #[error("Invalid QoS level: {0}")]
    InvalidQos(u8),

    /// Protocol name or level is not MQTT 3.1.1
    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    /// A string field is not valid UTF-8
    #[error("Invalid UTF-8 in string field")]
    InvalidUtf8,

    /// A string or binary field exceeds 65535 bytes
    #[error("Field too long: {0} bytes")]
    FieldTooLong(usize),

    /// Publish topic is empty or contains wildcards
    #[error("Invalid topic name: {0:?}")]
    InvalidTopic(String),

    /// Packet structure is inconsistent
    #[error("Malformed packet")]
    MalformedPacket,

    /// Remaining length is above the reader's limit
    #[error("Packet body of {size} bytes exceeds the {max} byte limit")]
    PacketTooLarge {
        /// Announced body size
        size: usize,
        /// Limit in force
        max: usize,
    },
}

/// MQTT client errors
#[derive(Debug, Error)]
pub enum MqttError {
    /// Network I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A packet could not be encoded or decoded
    #[error("Protocol error: {0}")]
    Protocol(#[from] PacketError),

    /// The broker refused the connection
    #[error("Connection refused by broker: {0:?}")]
    Refused(ConnectReturnCode),

    /// The broker answered CONNECT with something other than CONNACK
    #[error("Unexpected packet during handshake: {0}")]
    UnexpectedPacket(&'static str),

    /// The operation did not complete in time
    #[error("Timed out: {0}")]
    Timeout(&'static str),

    /// QoS level not supported by this client
    #[error("QoS {0} is not supported")]
    UnsupportedQos(u8),

    /// The client is not connected
    #[error("Not connected")]
    NotConnected,
}

impl MqttError {
    /// Whether retrying the same operation later may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Io(_) | Self::Timeout(_) | Self::NotConnected => true,
            Self::Refused(code) => *code == ConnectReturnCode::ServerUnavailable,
            Self::Protocol(_) | Self::UnexpectedPacket(_) | Self::UnsupportedQos(_) => false,
        }
    }
}
