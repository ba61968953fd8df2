use crate::error::PacketError;
use std::fmt;

/// CONNACK return code
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectReturnCode {
    /// Connection accepted
    Accepted = 0,
    /// Broker does not support MQTT 3.1.1
    UnacceptableProtocolVersion = 1,
    /// Client identifier not allowed
    IdentifierRejected = 2,
    /// Broker is up but the MQTT service is not available
    ServerUnavailable = 3,
    /// Malformed user name or password
    BadUserNameOrPassword = 4,
    /// Client is not authorized
    NotAuthorized = 5,
}

impl TryFrom<u8> for ConnectReturnCode {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Accepted),
            1 => Ok(Self::UnacceptableProtocolVersion),
            2 => Ok(Self::IdentifierRejected),
            3 => Ok(Self::ServerUnavailable),
            4 => Ok(Self::BadUserNameOrPassword),
            5 => Ok(Self::NotAuthorized),
            _ => Err(PacketError::MalformedPacket),
        }
    }
}

impl fmt::Display for ConnectReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Accepted => "accepted",
            Self::UnacceptableProtocolVersion => "unacceptable protocol version",
            Self::IdentifierRejected => "identifier rejected",
            Self::ServerUnavailable => "server unavailable",
            Self::BadUserNameOrPassword => "bad user name or password",
            Self::NotAuthorized => "not authorized",
        };
        f.write_str(text)
    }
}

/// CONNACK packet (broker to client)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnAckPacket {
    /// Broker resumed a stored session
    pub session_present: bool,
    /// Result of the connection attempt
    pub return_code: ConnectReturnCode,
}

impl ConnAckPacket {
    pub(crate) fn encode_body(&self, out: &mut Vec<u8>) {
        out.push(u8::from(self.session_present));
        out.push(self.return_code as u8);
    }

    pub(crate) fn decode_body(body: &[u8]) -> Result<Self, PacketError> {
        let [ack_flags, code] = body else {
            return Err(PacketError::MalformedPacket);
        };
        if ack_flags & 0xFE != 0 {
            return Err(PacketError::MalformedPacket);
        }
        Ok(Self {
            session_present: ack_flags & 0x01 != 0,
            return_code: ConnectReturnCode::try_from(*code)?,
        })
    }
}
