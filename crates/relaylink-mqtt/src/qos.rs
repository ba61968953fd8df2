//! Quality of service levels.

use crate::error::PacketError;
use std::fmt;

/// MQTT delivery guarantee
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QoS {
    /// Fire and forget
    #[default]
    AtMostOnce = 0,
    /// Acknowledged delivery (PUBACK)
    AtLeastOnce = 1,
    /// Four-step handshake (not supported for publishing)
    ExactlyOnce = 2,
}

impl QoS {
    /// Parse a QoS level from its wire value
    ///
    /// # Errors
    /// Returns `PacketError::InvalidQos` for values above 2
    pub const fn from_u8(value: u8) -> Result<Self, PacketError> {
        match value {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactlyOnce),
            _ => Err(PacketError::InvalidQos(value)),
        }
    }
}

impl TryFrom<u8> for QoS {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value)
    }
}

impl fmt::Display for QoS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos_from_u8() {
        assert_eq!(QoS::from_u8(0), Ok(QoS::AtMostOnce));
        assert_eq!(QoS::from_u8(1), Ok(QoS::AtLeastOnce));
        assert_eq!(QoS::from_u8(2), Ok(QoS::ExactlyOnce));
        assert_eq!(QoS::from_u8(3), Err(PacketError::InvalidQos(3)));
    }
}
