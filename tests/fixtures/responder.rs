//! Discovery responder fixture.

use relaylink_discovery::DiscoveryConfig;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

/// Answers every probe it receives, optionally staying silent
pub struct Responder {
    addr: SocketAddr,
    probes: Arc<Mutex<Vec<Vec<u8>>>>,
    task: JoinHandle<()>,
}

impl Responder {
    /// Reply to each probe with `reply`
    pub async fn start(reply: &[u8]) -> Self {
        Self::spawn(Some(reply.to_vec())).await
    }

    /// Record probes but never reply
    pub async fn silent() -> Self {
        Self::spawn(None).await
    }

    async fn spawn(reply: Option<Vec<u8>>) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .expect("bind responder");
        let addr = socket.local_addr().expect("responder addr");
        let probes = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&probes);
        let task = tokio::spawn(async move {
            let mut buf = [0u8; 256];
            while let Ok((len, from)) = socket.recv_from(&mut buf).await {
                seen.lock().unwrap().push(buf[..len].to_vec());
                if let Some(reply) = &reply {
                    let _ = socket.send_to(reply, from).await;
                }
            }
        });

        Self { addr, probes, task }
    }

    /// Address probes should be sent to
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Every probe payload received so far
    pub fn probes(&self) -> Vec<Vec<u8>> {
        self.probes.lock().unwrap().clone()
    }

    /// Discovery configuration aimed at this responder
    pub fn discovery_config(&self, broker_port: u16) -> DiscoveryConfig {
        DiscoveryConfig {
            broadcast_addr: self.addr,
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            broker_port,
            response_timeout: Duration::from_secs(2),
            probe_attempts: 1,
        }
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        self.task.abort();
    }
}
