use super::{read_string, read_u16, write_string, write_u16};
use crate::error::PacketError;
use crate::qos::QoS;

const FLAG_RETAIN: u8 = 0x01;
const FLAG_DUP: u8 = 0x08;
const QOS_SHIFT: u8 = 1;

/// PUBLISH packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPacket {
    /// Topic name (no wildcards)
    pub topic: String,
    /// Delivery guarantee
    pub qos: QoS,
    /// Broker should keep this as the topic's last known value
    pub retain: bool,
    /// Redelivery of an earlier attempt
    pub dup: bool,
    /// Present iff `qos` is above 0
    pub packet_id: Option<u16>,
    /// Application payload
    pub payload: Vec<u8>,
}

impl PublishPacket {
    /// Check that `topic` is usable as a publish topic name
    ///
    /// # Errors
    /// Returns `PacketError::InvalidTopic` for empty topics or topics with
    /// `+`, `#` or NUL characters.
    pub fn validate_topic(topic: &str) -> Result<(), PacketError> {
        if topic.is_empty() || topic.contains(['+', '#', '\0']) {
            return Err(PacketError::InvalidTopic(topic.to_string()));
        }
        Ok(())
    }

    pub(crate) fn flags(&self) -> u8 {
        let mut flags = (self.qos as u8) << QOS_SHIFT;
        if self.retain {
            flags |= FLAG_RETAIN;
        }
        if self.dup {
            flags |= FLAG_DUP;
        }
        flags
    }

    pub(crate) fn encode_body(&self, out: &mut Vec<u8>) -> Result<(), PacketError> {
        Self::validate_topic(&self.topic)?;
        write_string(&self.topic, out)?;
        match (self.qos, self.packet_id) {
            (QoS::AtMostOnce, None) => {}
            (QoS::AtLeastOnce | QoS::ExactlyOnce, Some(id)) if id != 0 => write_u16(id, out),
            _ => return Err(PacketError::MalformedPacket),
        }
        out.extend_from_slice(&self.payload);
        Ok(())
    }

    pub(crate) fn decode_body(flags: u8, body: &[u8]) -> Result<Self, PacketError> {
        let qos = QoS::from_u8((flags >> QOS_SHIFT) & 0x03)?;
        let dup = flags & FLAG_DUP != 0;
        if qos == QoS::AtMostOnce && dup {
            return Err(PacketError::InvalidFlags {
                packet_type: 3,
                flags,
            });
        }

        let mut offset = 0;
        let topic = read_string(body, &mut offset)?;
        Self::validate_topic(&topic)?;

        let packet_id = if qos == QoS::AtMostOnce {
            None
        } else {
            match read_u16(body, &mut offset)? {
                0 => return Err(PacketError::MalformedPacket),
                id => Some(id),
            }
        };

        Ok(Self {
            topic,
            qos,
            retain: flags & FLAG_RETAIN != 0,
            dup,
            packet_id,
            payload: body[offset..].to_vec(),
        })
    }
}
