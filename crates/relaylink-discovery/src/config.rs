//! Discovery configuration.
//!
//! The addresses and ports define the discovery protocol and must match what
//! the broker-side responder expects. They are configurable so tests can run
//! discovery against a loopback responder.

use crate::error::DiscoveryError;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

/// Default broadcast destination for probes
pub const DEFAULT_BROADCAST_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::BROADCAST, 10001));

/// Default local address replies are received on
pub const DEFAULT_LISTEN_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 10002));

/// Default MQTT broker port appended to the responder's IP
pub const DEFAULT_BROKER_PORT: u16 = 1883;

/// Probe datagram content
pub const PROBE_PAYLOAD: [u8; 1] = [0x01];

/// Largest reply read from the socket; longer datagrams are truncated
pub const MAX_RESPONSE_SIZE: usize = 1024;

/// Discovery configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Where the probe is sent
    pub broadcast_addr: SocketAddr,
    /// Local address the discovery socket binds to
    pub listen_addr: SocketAddr,
    /// Broker port combined with the responder's IP
    pub broker_port: u16,
    /// How long one attempt waits for a reply
    pub response_timeout: Duration,
    /// Probe attempts before giving up (0 = keep probing)
    pub probe_attempts: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            broadcast_addr: DEFAULT_BROADCAST_ADDR,
            listen_addr: DEFAULT_LISTEN_ADDR,
            broker_port: DEFAULT_BROKER_PORT,
            response_timeout: Duration::from_secs(5),
            probe_attempts: 3,
        }
    }
}

impl DiscoveryConfig {
    /// Build a configuration from textual addresses.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryError::InvalidConfig` if either address does not parse
    /// as `ip:port`, if the address families differ, or if `broker_port` is 0.
    pub fn parse(
        broadcast_addr: &str,
        listen_addr: &str,
        broker_port: u16,
    ) -> Result<Self, DiscoveryError> {
        let broadcast: SocketAddr = broadcast_addr.parse().map_err(|e| {
            DiscoveryError::InvalidConfig(format!("broadcast address '{broadcast_addr}': {e}"))
        })?;
        let listen: SocketAddr = listen_addr.parse().map_err(|e| {
            DiscoveryError::InvalidConfig(format!("listen address '{listen_addr}': {e}"))
        })?;

        let config = Self {
            broadcast_addr: broadcast,
            listen_addr: listen,
            broker_port,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the per-attempt reply timeout
    #[must_use]
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Set the number of probe attempts
    #[must_use]
    pub fn with_probe_attempts(mut self, attempts: u32) -> Self {
        self.probe_attempts = attempts;
        self
    }

    /// Check the configuration for values that can never work
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryError::InvalidConfig` describing the first problem found
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        if self.broadcast_addr.is_ipv4() != self.listen_addr.is_ipv4() {
            return Err(DiscoveryError::InvalidConfig(format!(
                "broadcast address {} and listen address {} use different address families",
                self.broadcast_addr, self.listen_addr
            )));
        }
        if self.broadcast_addr.port() == 0 {
            return Err(DiscoveryError::InvalidConfig(
                "broadcast port must not be 0".to_string(),
            ));
        }
        if self.broker_port == 0 {
            return Err(DiscoveryError::InvalidConfig(
                "broker port must not be 0".to_string(),
            ));
        }
        if self.response_timeout.is_zero() {
            return Err(DiscoveryError::InvalidConfig(
                "response timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_wire_protocol() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.broadcast_addr.to_string(), "255.255.255.255:10001");
        assert_eq!(config.listen_addr.to_string(), "0.0.0.0:10002");
        assert_eq!(config.broker_port, 1883);
        assert_eq!(PROBE_PAYLOAD, [0x01]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_valid() {
        let config = DiscoveryConfig::parse("127.0.0.1:9000", "127.0.0.1:0", 1883).unwrap();
        assert_eq!(config.broadcast_addr.port(), 9000);
        assert_eq!(config.listen_addr.port(), 0);
    }

    #[test]
    fn test_parse_malformed_addresses() {
        assert!(matches!(
            DiscoveryConfig::parse("255.255.255.255", "0.0.0.0:10002", 1883),
            Err(DiscoveryError::InvalidConfig(_))
        ));
        assert!(matches!(
            DiscoveryConfig::parse("255.255.255.255:10001", ":10002", 1883),
            Err(DiscoveryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_mixed_families() {
        let result = DiscoveryConfig::parse("255.255.255.255:10001", "[::]:10002", 1883);
        assert!(matches!(result, Err(DiscoveryError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_zero_ports() {
        assert!(DiscoveryConfig::parse("255.255.255.255:0", "0.0.0.0:10002", 1883).is_err());
        assert!(DiscoveryConfig::parse("255.255.255.255:10001", "0.0.0.0:10002", 0).is_err());
    }

    #[test]
    fn test_builders() {
        let config = DiscoveryConfig::default()
            .with_response_timeout(Duration::from_millis(250))
            .with_probe_attempts(0);
        assert_eq!(config.response_timeout, Duration::from_millis(250));
        assert_eq!(config.probe_attempts, 0);
    }
}
