//! Minimal MQTT broker fixture.

use relaylink_mqtt::{
    ConnAckPacket, ConnectPacket, ConnectReturnCode, Packet, PubAckPacket, QoS, read_packet,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

/// A PUBLISH as seen by the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedPublish {
    /// Topic name
    pub topic: String,
    /// Payload
    pub payload: Vec<u8>,
    /// QoS
    pub qos: QoS,
    /// Retain flag
    pub retain: bool,
}

#[derive(Default)]
struct Log {
    accepted: u32,
    connects: Vec<ConnectPacket>,
    publishes: Vec<ReceivedPublish>,
    disconnects: u32,
}

/// Accepts MQTT sessions on loopback
pub struct FakeBroker {
    addr: SocketAddr,
    log: Arc<Mutex<Log>>,
    kick: Arc<watch::Sender<u32>>,
    task: JoinHandle<()>,
}

impl FakeBroker {
    /// Accept every session
    pub async fn start() -> Self {
        Self::spawn(0, ConnectReturnCode::Accepted).await
    }

    /// Drop the first `n` TCP connections before any handshake
    pub async fn dropping_first(n: u32) -> Self {
        Self::spawn(n, ConnectReturnCode::Accepted).await
    }

    /// Answer every CONNECT with `code`
    pub async fn refusing(code: ConnectReturnCode) -> Self {
        Self::spawn(0, code).await
    }

    async fn spawn(drop_first: u32, code: ConnectReturnCode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind broker");
        let addr = listener.local_addr().expect("broker addr");
        let log = Arc::new(Mutex::new(Log::default()));
        let kick = Arc::new(watch::Sender::new(0u32));

        let shared = Arc::clone(&log);
        let kicks = Arc::clone(&kick);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let accepted = {
                    let mut log = shared.lock().unwrap();
                    log.accepted += 1;
                    log.accepted
                };
                if accepted <= drop_first {
                    drop(stream);
                    continue;
                }
                tokio::spawn(serve(stream, code, Arc::clone(&shared), kicks.subscribe()));
            }
        });

        Self {
            addr,
            log,
            kick,
            task,
        }
    }

    /// Broker address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Broker port
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// TCP connections accepted so far
    pub fn accepted(&self) -> u32 {
        self.log.lock().unwrap().accepted
    }

    /// CONNECT packets received
    pub fn connects(&self) -> Vec<ConnectPacket> {
        self.log.lock().unwrap().connects.clone()
    }

    /// PUBLISH packets received
    pub fn publishes(&self) -> Vec<ReceivedPublish> {
        self.log.lock().unwrap().publishes.clone()
    }

    /// DISCONNECT packets received
    pub fn disconnects(&self) -> u32 {
        self.log.lock().unwrap().disconnects
    }

    /// Close every session open right now, as a restarting broker would.
    /// Sessions accepted later are unaffected.
    pub fn kick_sessions(&self) {
        self.kick.send_modify(|generation| *generation += 1);
    }

    /// Poll until `check` holds or `timeout` passes
    pub async fn wait_until(&self, timeout: Duration, check: impl Fn(&FakeBroker) -> bool) -> bool {
        let deadline = time::Instant::now() + timeout;
        while time::Instant::now() < deadline {
            if check(self) {
                return true;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        check(self)
    }
}

impl Drop for FakeBroker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    mut stream: TcpStream,
    code: ConnectReturnCode,
    log: Arc<Mutex<Log>>,
    mut kick: watch::Receiver<u32>,
) {
    let Ok(Packet::Connect(connect)) = read_packet(&mut stream).await else {
        return;
    };
    log.lock().unwrap().connects.push(connect);

    let ack = Packet::ConnAck(ConnAckPacket {
        session_present: false,
        return_code: code,
    });
    if stream.write_all(&ack.encode().unwrap()).await.is_err() || code != ConnectReturnCode::Accepted {
        return;
    }

    loop {
        let packet = tokio::select! {
            read = read_packet(&mut stream) => match read {
                Ok(packet) => packet,
                Err(_) => return,
            },
            _ = kick.changed() => return,
        };
        let reply = match packet {
            Packet::Publish(publish) => {
                log.lock().unwrap().publishes.push(ReceivedPublish {
                    topic: publish.topic,
                    payload: publish.payload,
                    qos: publish.qos,
                    retain: publish.retain,
                });
                publish
                    .packet_id
                    .map(|packet_id| Packet::PubAck(PubAckPacket { packet_id }))
            }
            Packet::PingReq => Some(Packet::PingResp),
            Packet::Disconnect => {
                log.lock().unwrap().disconnects += 1;
                return;
            }
            _ => None,
        };
        if let Some(reply) = reply {
            if stream.write_all(&reply.encode().unwrap()).await.is_err() {
                return;
            }
        }
    }
}
