//! Broker endpoint derived from a discovery reply.

use crate::probe::ProbeResponse;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Network address of the discovered broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BrokerEndpoint {
    ip: IpAddr,
    port: u16,
}

impl BrokerEndpoint {
    /// Create an endpoint from an IP and port
    #[must_use]
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Derive the endpoint from a reply: the reply's source IP plus `broker_port`.
    ///
    /// The reply payload and source port are ignored.
    #[must_use]
    pub fn from_response(response: &ProbeResponse, broker_port: u16) -> Self {
        Self::new(response.from.ip(), broker_port)
    }

    /// Broker IP
    #[must_use]
    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// Broker port
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Endpoint as a socket address
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

impl fmt::Display for BrokerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

impl From<BrokerEndpoint> for SocketAddr {
    fn from(endpoint: BrokerEndpoint) -> Self {
        endpoint.socket_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(from: &str, payload: &[u8]) -> ProbeResponse {
        ProbeResponse {
            from: from.parse().unwrap(),
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn test_endpoint_from_source_ip() {
        let endpoint = BrokerEndpoint::from_response(&response("10.0.0.5:10001", b"hi"), 1883);
        assert_eq!(endpoint.to_string(), "10.0.0.5:1883");
        assert_eq!(endpoint.port(), 1883);
    }

    #[test]
    fn test_payload_does_not_affect_endpoint() {
        let a = BrokerEndpoint::from_response(&response("192.168.1.20:10001", b"10.9.9.9"), 1883);
        let b = BrokerEndpoint::from_response(&response("192.168.1.20:4444", &[0xff; 64]), 1883);
        assert_eq!(a, b);
    }

    #[test]
    fn test_ipv6_display() {
        let endpoint = BrokerEndpoint::from_response(&response("[fe80::1]:10001", b""), 1883);
        assert_eq!(endpoint.to_string(), "[fe80::1]:1883");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;
        use std::net::Ipv4Addr;

        proptest! {
            #[test]
            fn endpoint_ignores_payload(
                octets in any::<[u8; 4]>(),
                src_port in any::<u16>(),
                first in prop::collection::vec(any::<u8>(), 0..1024),
                second in prop::collection::vec(any::<u8>(), 0..1024),
            ) {
                let from = SocketAddr::new(IpAddr::V4(Ipv4Addr::from(octets)), src_port);
                let a = ProbeResponse { from, payload: first };
                let b = ProbeResponse { from, payload: second };

                let ea = BrokerEndpoint::from_response(&a, 1883);
                let eb = BrokerEndpoint::from_response(&b, 1883);
                prop_assert_eq!(ea, eb);
                prop_assert_eq!(ea.ip(), from.ip());
            }
        }
    }
}
