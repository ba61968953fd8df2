//! Broadcast probe exchange.
//!
//! One attempt opens a fresh socket, sends exactly one probe, waits for one
//! reply and closes the socket again, whatever the outcome. The first reply
//! wins; any later replies are never read.

use crate::config::{DiscoveryConfig, MAX_RESPONSE_SIZE, PROBE_PAYLOAD};
use crate::endpoint::BrokerEndpoint;
use crate::error::DiscoveryError;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::time;
use tracing::{debug, info, trace, warn};

/// A datagram received in answer to a probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    /// Source address of the reply
    pub from: SocketAddr,
    /// Reply content (logged, never interpreted)
    pub payload: Vec<u8>,
}

/// Open the discovery socket with broadcast enabled.
fn open_socket(addr: SocketAddr) -> Result<UdpSocket, DiscoveryError> {
    let bind_err = |source| DiscoveryError::Bind { addr, source };

    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(bind_err)?;
    socket.set_broadcast(true).map_err(bind_err)?;
    socket.set_nonblocking(true).map_err(bind_err)?;
    socket.bind(&addr.into()).map_err(bind_err)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(bind_err)
}

/// Run a single probe/reply exchange.
///
/// Returns `Ok(None)` if no reply arrived within the response timeout.
///
/// # Errors
///
/// Returns `DiscoveryError` if the socket cannot be bound, the probe cannot be
/// sent, or the socket fails while receiving.
pub async fn probe_once(config: &DiscoveryConfig) -> Result<Option<ProbeResponse>, DiscoveryError> {
    let socket = open_socket(config.listen_addr)?;

    let sent = socket
        .send_to(&PROBE_PAYLOAD, config.broadcast_addr)
        .await
        .map_err(|source| DiscoveryError::Send {
            addr: config.broadcast_addr,
            source,
        })?;
    trace!("packet-written: bytes={} to={}", sent, config.broadcast_addr);

    let mut buf = [0u8; MAX_RESPONSE_SIZE];
    let (len, from) = match time::timeout(config.response_timeout, socket.recv_from(&mut buf)).await
    {
        Ok(received) => received.map_err(DiscoveryError::Receive)?,
        Err(_) => return Ok(None),
    };

    let payload = buf[..len].to_vec();
    trace!(
        "Received {:?} ({}) from {}",
        String::from_utf8_lossy(&payload),
        hex::encode(&payload),
        from
    );

    Ok(Some(ProbeResponse { from, payload }))
}

/// Locate the broker.
///
/// Repeats the probe exchange while attempts time out, up to
/// `config.probe_attempts` probes (unbounded when 0). Socket errors are
/// returned immediately.
///
/// # Errors
///
/// Returns `DiscoveryError::NoResponse` if every attempt timed out, or the
/// first socket error encountered.
pub async fn discover(config: &DiscoveryConfig) -> Result<BrokerEndpoint, DiscoveryError> {
    config.validate()?;

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        debug!(
            "Discovery probe {} to {} (listening on {})",
            attempt, config.broadcast_addr, config.listen_addr
        );

        if let Some(response) = probe_once(config).await? {
            let endpoint = BrokerEndpoint::from_response(&response, config.broker_port);
            info!("Broker {}", endpoint);
            return Ok(endpoint);
        }

        warn!(
            "No discovery reply within {:?} (attempt {})",
            config.response_timeout, attempt
        );
        if config.probe_attempts != 0 && attempt >= config.probe_attempts {
            return Err(DiscoveryError::NoResponse { attempts: attempt });
        }
    }
}
