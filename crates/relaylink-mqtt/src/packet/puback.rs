use super::{read_u16, write_u16};
use crate::error::PacketError;

/// PUBACK packet, acknowledging a QoS 1 PUBLISH
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PubAckPacket {
    /// Identifier of the acknowledged PUBLISH
    pub packet_id: u16,
}

impl PubAckPacket {
    pub(crate) fn encode_body(&self, out: &mut Vec<u8>) {
        write_u16(self.packet_id, out);
    }

    pub(crate) fn decode_body(body: &[u8]) -> Result<Self, PacketError> {
        if body.len() != 2 {
            return Err(PacketError::MalformedPacket);
        }
        let mut offset = 0;
        Ok(Self {
            packet_id: read_u16(body, &mut offset)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Packet;

    #[test]
    fn test_puback_wire_format() {
        let bytes = Packet::PubAck(PubAckPacket { packet_id: 0x1234 }).encode().unwrap();
        assert_eq!(bytes, vec![0x40, 0x02, 0x12, 0x34]);
    }

    #[test]
    fn test_puback_wrong_length() {
        assert_eq!(
            PubAckPacket::decode_body(&[0x00, 0x01, 0x02]),
            Err(PacketError::MalformedPacket)
        );
    }
}
