use super::{read_binary, read_string, read_u16, write_string, write_u16};
use crate::error::PacketError;

/// Protocol name carried in every CONNECT
pub const MQTT_PROTOCOL_NAME: &str = "MQTT";
/// Protocol level for MQTT 3.1.1
pub const MQTT_3_1_1_PROTOCOL_LEVEL: u8 = 4;

const FLAG_RESERVED: u8 = 0x01;
const FLAG_CLEAN_SESSION: u8 = 0x02;
const FLAG_WILL: u8 = 0x04;
const FLAG_WILL_QOS: u8 = 0x18;
const FLAG_WILL_RETAIN: u8 = 0x20;
const FLAG_PASSWORD: u8 = 0x40;
const FLAG_USERNAME: u8 = 0x80;

/// CONNECT packet (client to broker)
///
/// Will message and credentials are accepted on decode but not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectPacket {
    /// Client identifier
    pub client_id: String,
    /// Keep-alive interval in seconds (0 disables)
    pub keep_alive: u16,
    /// Start a fresh session
    pub clean_session: bool,
}

impl ConnectPacket {
    pub(crate) fn encode_body(&self, out: &mut Vec<u8>) -> Result<(), PacketError> {
        write_string(MQTT_PROTOCOL_NAME, out)?;
        out.push(MQTT_3_1_1_PROTOCOL_LEVEL);
        out.push(if self.clean_session { FLAG_CLEAN_SESSION } else { 0 });
        write_u16(self.keep_alive, out);
        write_string(&self.client_id, out)
    }

    pub(crate) fn decode_body(body: &[u8]) -> Result<Self, PacketError> {
        let mut offset = 0;

        let protocol = read_string(body, &mut offset)?;
        if protocol != MQTT_PROTOCOL_NAME {
            return Err(PacketError::UnsupportedProtocol(protocol));
        }
        let level = *body.get(offset).ok_or(PacketError::MalformedPacket)?;
        offset += 1;
        if level != MQTT_3_1_1_PROTOCOL_LEVEL {
            return Err(PacketError::UnsupportedProtocol(format!("{protocol} level {level}")));
        }

        let flags = *body.get(offset).ok_or(PacketError::MalformedPacket)?;
        offset += 1;
        if flags & FLAG_RESERVED != 0 {
            return Err(PacketError::MalformedPacket);
        }
        let has_will = flags & FLAG_WILL != 0;
        if !has_will && flags & (FLAG_WILL_QOS | FLAG_WILL_RETAIN) != 0 {
            return Err(PacketError::MalformedPacket);
        }
        if flags & FLAG_PASSWORD != 0 && flags & FLAG_USERNAME == 0 {
            return Err(PacketError::MalformedPacket);
        }

        let keep_alive = read_u16(body, &mut offset)?;
        let client_id = read_string(body, &mut offset)?;

        if has_will {
            read_string(body, &mut offset)?;
            read_binary(body, &mut offset)?;
        }
        if flags & FLAG_USERNAME != 0 {
            read_string(body, &mut offset)?;
        }
        if flags & FLAG_PASSWORD != 0 {
            read_binary(body, &mut offset)?;
        }
        if offset != body.len() {
            return Err(PacketError::MalformedPacket);
        }

        Ok(Self {
            client_id,
            keep_alive,
            clean_session: flags & FLAG_CLEAN_SESSION != 0,
        })
    }
}
