//! MQTT 3.1.1 control packets.
//!
//! Every packet is a fixed header (type nibble, flag nibble, remaining
//! length varint) followed by `remaining length` bytes of body.

mod connack;
mod connect;
mod puback;
mod publish;

pub use connack::{ConnAckPacket, ConnectReturnCode};
pub use connect::{ConnectPacket, MQTT_3_1_1_PROTOCOL_LEVEL, MQTT_PROTOCOL_NAME};
pub use puback::PubAckPacket;
pub use publish::PublishPacket;

use crate::error::{MqttError, PacketError};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Largest value the remaining-length varint can carry
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Default body cap for [`read_packet`]. The client never subscribes, so the
/// broker only sends it CONNACK, PUBACK and PINGRESP.
pub const MAX_INBOUND_PACKET: usize = 64 * 1024;

/// Control packet type (high nibble of the first header byte)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Client connection request
    Connect = 1,
    /// Connection acknowledgment
    ConnAck = 2,
    /// Application message
    Publish = 3,
    /// QoS 1 acknowledgment
    PubAck = 4,
    /// Keep-alive request
    PingReq = 12,
    /// Keep-alive response
    PingResp = 13,
    /// Client disconnect
    Disconnect = 14,
}

impl TryFrom<u8> for PacketType {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Connect),
            2 => Ok(Self::ConnAck),
            3 => Ok(Self::Publish),
            4 => Ok(Self::PubAck),
            12 => Ok(Self::PingReq),
            13 => Ok(Self::PingResp),
            14 => Ok(Self::Disconnect),
            other => Err(PacketError::InvalidPacketType(other)),
        }
    }
}

/// A decoded control packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// CONNECT
    Connect(ConnectPacket),
    /// CONNACK
    ConnAck(ConnAckPacket),
    /// PUBLISH
    Publish(PublishPacket),
    /// PUBACK
    PubAck(PubAckPacket),
    /// PINGREQ
    PingReq,
    /// PINGRESP
    PingResp,
    /// DISCONNECT
    Disconnect,
}

impl Packet {
    /// Packet type
    #[must_use]
    pub fn packet_type(&self) -> PacketType {
        match self {
            Self::Connect(_) => PacketType::Connect,
            Self::ConnAck(_) => PacketType::ConnAck,
            Self::Publish(_) => PacketType::Publish,
            Self::PubAck(_) => PacketType::PubAck,
            Self::PingReq => PacketType::PingReq,
            Self::PingResp => PacketType::PingResp,
            Self::Disconnect => PacketType::Disconnect,
        }
    }

    /// Human-readable packet name for logging
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect(_) => "CONNECT",
            Self::ConnAck(_) => "CONNACK",
            Self::Publish(_) => "PUBLISH",
            Self::PubAck(_) => "PUBACK",
            Self::PingReq => "PINGREQ",
            Self::PingResp => "PINGRESP",
            Self::Disconnect => "DISCONNECT",
        }
    }

    fn flags(&self) -> u8 {
        match self {
            Self::Publish(p) => p.flags(),
            _ => 0,
        }
    }

    /// Encode the packet into its wire form
    ///
    /// # Errors
    /// Returns `PacketError` if a field cannot be represented
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let mut body = Vec::new();
        match self {
            Self::Connect(p) => p.encode_body(&mut body)?,
            Self::ConnAck(p) => p.encode_body(&mut body),
            Self::Publish(p) => p.encode_body(&mut body)?,
            Self::PubAck(p) => p.encode_body(&mut body),
            Self::PingReq | Self::PingResp | Self::Disconnect => {}
        }

        let mut out = Vec::with_capacity(body.len() + 5);
        out.push(((self.packet_type() as u8) << 4) | self.flags());
        write_remaining_length(body.len(), &mut out)?;
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Decode one packet from the front of `bytes`.
    ///
    /// Returns the packet and the number of bytes consumed.
    ///
    /// # Errors
    /// Returns `PacketError::IncompletePacket` if `bytes` holds less than one
    /// full packet, or another `PacketError` if the packet is malformed.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), PacketError> {
        let header = *bytes.first().ok_or(PacketError::IncompletePacket)?;
        let (remaining, len_bytes) = read_remaining_length(&bytes[1..])?;
        let start = 1 + len_bytes;
        let end = start + remaining;
        if bytes.len() < end {
            return Err(PacketError::IncompletePacket);
        }
        let packet = Self::decode_body(header, &bytes[start..end])?;
        Ok((packet, end))
    }

    /// Decode a packet body given its first header byte
    ///
    /// # Errors
    /// Returns `PacketError` if the body does not match the packet type
    pub fn decode_body(header: u8, body: &[u8]) -> Result<Self, PacketError> {
        let packet_type = PacketType::try_from(header >> 4)?;
        let flags = header & 0x0F;

        if packet_type != PacketType::Publish && flags != 0 {
            return Err(PacketError::InvalidFlags {
                packet_type: packet_type as u8,
                flags,
            });
        }

        match packet_type {
            PacketType::Connect => ConnectPacket::decode_body(body).map(Self::Connect),
            PacketType::ConnAck => ConnAckPacket::decode_body(body).map(Self::ConnAck),
            PacketType::Publish => PublishPacket::decode_body(flags, body).map(Self::Publish),
            PacketType::PubAck => PubAckPacket::decode_body(body).map(Self::PubAck),
            PacketType::PingReq => expect_empty(body).map(|()| Self::PingReq),
            PacketType::PingResp => expect_empty(body).map(|()| Self::PingResp),
            PacketType::Disconnect => expect_empty(body).map(|()| Self::Disconnect),
        }
    }
}

fn expect_empty(body: &[u8]) -> Result<(), PacketError> {
    if body.is_empty() {
        Ok(())
    } else {
        Err(PacketError::MalformedPacket)
    }
}

/// Read one complete packet from an async stream, with a body of at most
/// [`MAX_INBOUND_PACKET`] bytes.
///
/// # Errors
/// Returns `MqttError::Io` on stream failure (including EOF) and
/// `MqttError::Protocol` if the packet is malformed or too large.
pub async fn read_packet<R>(reader: &mut R) -> Result<Packet, MqttError>
where
    R: AsyncRead + Unpin,
{
    read_packet_limited(reader, MAX_INBOUND_PACKET).await
}

/// Read one complete packet whose body is at most `max_body` bytes.
///
/// The length is checked before the body buffer is allocated.
///
/// # Errors
/// As [`read_packet`]; `PacketError::PacketTooLarge` when the announced
/// remaining length exceeds `max_body`.
pub async fn read_packet_limited<R>(reader: &mut R, max_body: usize) -> Result<Packet, MqttError>
where
    R: AsyncRead + Unpin,
{
    let header = reader.read_u8().await?;

    let mut remaining = 0usize;
    let mut multiplier = 1usize;
    for i in 0.. {
        if i == 4 {
            return Err(PacketError::InvalidLengthEncoding.into());
        }
        let byte = reader.read_u8().await?;
        remaining += usize::from(byte & 0x7F) * multiplier;
        if byte & 0x80 == 0 {
            break;
        }
        multiplier *= 128;
    }

    if remaining > max_body {
        return Err(PacketError::PacketTooLarge {
            size: remaining,
            max: max_body,
        }
        .into());
    }

    let mut body = vec![0u8; remaining];
    reader.read_exact(&mut body).await?;
    Ok(Packet::decode_body(header, &body)?)
}

/// Append a remaining-length varint
pub(crate) fn write_remaining_length(value: usize, out: &mut Vec<u8>) -> Result<(), PacketError> {
    if value > MAX_REMAINING_LENGTH {
        return Err(PacketError::InvalidLengthEncoding);
    }

    let mut encoded = value;
    loop {
        let mut byte = (encoded & 0x7F) as u8;
        encoded >>= 7;
        if encoded > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if encoded == 0 {
            return Ok(());
        }
    }
}

/// Read a remaining-length varint, returning (value, bytes used)
pub(crate) fn read_remaining_length(bytes: &[u8]) -> Result<(usize, usize), PacketError> {
    let mut value = 0usize;
    let mut multiplier = 1usize;

    for (i, byte) in bytes.iter().enumerate() {
        if i == 4 {
            return Err(PacketError::InvalidLengthEncoding);
        }
        value += usize::from(byte & 0x7F) * multiplier;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        multiplier *= 128;
    }

    if bytes.len() >= 4 {
        Err(PacketError::InvalidLengthEncoding)
    } else {
        Err(PacketError::IncompletePacket)
    }
}

pub(crate) fn write_u16(value: u16, out: &mut Vec<u8>) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn write_binary(data: &[u8], out: &mut Vec<u8>) -> Result<(), PacketError> {
    let len = u16::try_from(data.len()).map_err(|_| PacketError::FieldTooLong(data.len()))?;
    write_u16(len, out);
    out.extend_from_slice(data);
    Ok(())
}

pub(crate) fn write_string(s: &str, out: &mut Vec<u8>) -> Result<(), PacketError> {
    write_binary(s.as_bytes(), out)
}

pub(crate) fn read_u16(bytes: &[u8], offset: &mut usize) -> Result<u16, PacketError> {
    let end = *offset + 2;
    let slice = bytes.get(*offset..end).ok_or(PacketError::MalformedPacket)?;
    *offset = end;
    Ok(u16::from_be_bytes([slice[0], slice[1]]))
}

pub(crate) fn read_binary<'a>(bytes: &'a [u8], offset: &mut usize) -> Result<&'a [u8], PacketError> {
    let len = usize::from(read_u16(bytes, offset)?);
    let end = *offset + len;
    let slice = bytes.get(*offset..end).ok_or(PacketError::MalformedPacket)?;
    *offset = end;
    Ok(slice)
}

pub(crate) fn read_string(bytes: &[u8], offset: &mut usize) -> Result<String, PacketError> {
    let raw = read_binary(bytes, offset)?;
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|_| PacketError::InvalidUtf8)
}
