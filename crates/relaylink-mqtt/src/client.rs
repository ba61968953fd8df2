//! Async MQTT client over TCP.
//!
//! After the CONNECT/CONNACK handshake the socket is split: the caller owns
//! the write half (behind a mutex shared with the keep-alive task) and a
//! background task owns the read half. The reader clears in-flight QoS 1
//! publishes as PUBACKs arrive and marks the session lost on EOF or error;
//! [`MqttClient::closed`] resolves at that point.

use crate::error::MqttError;
use crate::packet::{ConnectPacket, ConnectReturnCode, Packet, PublishPacket, read_packet};
use crate::qos::QoS;
use std::collections::HashSet;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, trace, warn};

/// Default keep-alive interval
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Default bound on TCP connect plus handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttOptions {
    /// Client identifier sent in CONNECT
    pub client_id: String,
    /// Keep-alive interval (zero disables PINGREQ)
    pub keep_alive: Duration,
    /// Ask the broker for a fresh session
    pub clean_session: bool,
    /// Bound on TCP connect plus CONNECT/CONNACK
    pub connect_timeout: Duration,
}

impl Default for MqttOptions {
    fn default() -> Self {
        Self {
            client_id: format!("relaylink-{}", std::process::id()),
            keep_alive: DEFAULT_KEEP_ALIVE,
            clean_session: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl MqttOptions {
    /// Set the client identifier
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Set the keep-alive interval
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Set the connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Keep-alive as carried on the wire: whole seconds, rounded up
    fn keep_alive_secs(&self) -> u16 {
        let millis = self.keep_alive.as_millis();
        u16::try_from(millis.div_ceil(1000)).unwrap_or(u16::MAX)
    }
}

struct Shared {
    connected: watch::Sender<bool>,
    inflight: Mutex<HashSet<u16>>,
}

impl Shared {
    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Mark the session down, returning whether it was up
    fn mark_lost(&self) -> bool {
        self.connected.send_replace(false)
    }
}

/// A connected MQTT session
pub struct MqttClient {
    broker: SocketAddr,
    writer: Arc<Mutex<OwnedWriteHalf>>,
    shared: Arc<Shared>,
    next_packet_id: AtomicU16,
    reader_task: JoinHandle<()>,
    keep_alive_task: Option<JoinHandle<()>>,
}

impl MqttClient {
    /// Connect to a broker and complete the MQTT handshake.
    ///
    /// # Errors
    ///
    /// Returns `MqttError::Timeout` if TCP connect plus handshake exceed
    /// `options.connect_timeout`, `MqttError::Refused` for a non-zero CONNACK
    /// return code, or the underlying I/O or protocol error.
    pub async fn connect(broker: SocketAddr, options: MqttOptions) -> Result<Self, MqttError> {
        let stream = time::timeout(options.connect_timeout, handshake(broker, &options))
            .await
            .map_err(|_| MqttError::Timeout("connect"))??;

        let (reader, writer) = stream.into_split();
        let writer = Arc::new(Mutex::new(writer));
        let shared = Arc::new(Shared {
            connected: watch::Sender::new(true),
            inflight: Mutex::new(HashSet::new()),
        });

        let reader_task = tokio::spawn(run_reader(reader, Arc::clone(&shared), broker));
        let keep_alive_task = (!options.keep_alive.is_zero()).then(|| {
            tokio::spawn(run_keep_alive(
                Arc::clone(&writer),
                Arc::clone(&shared),
                options.keep_alive,
            ))
        });

        info!("Connected to MQTT broker {} as {}", broker, options.client_id);

        Ok(Self {
            broker,
            writer,
            shared,
            next_packet_id: AtomicU16::new(1),
            reader_task,
            keep_alive_task,
        })
    }

    /// Whether the session is still up
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    /// Resolves once the session is down: the broker closed it, a read or
    /// write failed, or [`Self::disconnect`] was called.
    pub async fn closed(&self) {
        let mut rx = self.shared.connected.subscribe();
        // The sender lives in `self.shared`, so this cannot fail while `self` exists
        let _ = rx.wait_for(|up| !*up).await;
    }

    /// Broker address this client connected to
    #[must_use]
    pub fn broker_addr(&self) -> SocketAddr {
        self.broker
    }

    /// Number of QoS 1 publishes still waiting for PUBACK
    pub async fn inflight_count(&self) -> usize {
        self.shared.inflight.lock().await.len()
    }

    /// Publish a message.
    ///
    /// Returns the packet identifier for QoS 1 publishes. The call returns
    /// once the packet is written; the identifier stays in flight until the
    /// broker acknowledges it.
    ///
    /// # Errors
    ///
    /// Returns `MqttError::UnsupportedQos` for QoS 2, `MqttError::NotConnected`
    /// if the session is down, or the write/encode error.
    pub async fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: &[u8],
    ) -> Result<Option<u16>, MqttError> {
        if qos == QoS::ExactlyOnce {
            return Err(MqttError::UnsupportedQos(qos as u8));
        }
        if !self.is_connected() {
            return Err(MqttError::NotConnected);
        }
        PublishPacket::validate_topic(topic)?;

        let packet_id = match qos {
            QoS::AtMostOnce => None,
            _ => Some(self.register_inflight().await),
        };

        let bytes = Packet::Publish(PublishPacket {
            topic: topic.to_string(),
            qos,
            retain,
            dup: false,
            packet_id,
            payload: payload.to_vec(),
        })
        .encode()?;

        if let Err(e) = self.send(&bytes).await {
            if let Some(id) = packet_id {
                self.shared.inflight.lock().await.remove(&id);
            }
            return Err(e);
        }

        debug!(
            "Published {} bytes to {:?} (qos={}, retain={}, id={:?})",
            payload.len(),
            topic,
            qos,
            retain,
            packet_id
        );
        Ok(packet_id)
    }

    /// Send DISCONNECT and stop the background tasks.
    ///
    /// Calling this on a session that is already down only stops the tasks.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if DISCONNECT could not be written.
    pub async fn disconnect(&self) -> Result<(), MqttError> {
        let was_connected = self.shared.mark_lost();
        self.stop_tasks();

        if was_connected {
            let bytes = Packet::Disconnect.encode()?;
            let mut writer = self.writer.lock().await;
            writer.write_all(&bytes).await?;
            writer.shutdown().await?;
            info!("Disconnected from MQTT broker {}", self.broker);
        }
        Ok(())
    }

    async fn register_inflight(&self) -> u16 {
        let mut inflight = self.shared.inflight.lock().await;
        loop {
            let id = self.next_packet_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 && inflight.insert(id) {
                return id;
            }
        }
    }

    async fn send(&self, bytes: &[u8]) -> Result<(), MqttError> {
        let result = self.writer.lock().await.write_all(bytes).await;
        if let Err(e) = result {
            if self.shared.mark_lost() {
                error!("MQTT write to {} failed, session lost: {}", self.broker, e);
            }
            return Err(e.into());
        }
        trace!("packet-written: bytes={} to={}", bytes.len(), self.broker);
        Ok(())
    }

    fn stop_tasks(&self) {
        self.reader_task.abort();
        if let Some(task) = &self.keep_alive_task {
            task.abort();
        }
    }
}

impl Drop for MqttClient {
    fn drop(&mut self) {
        self.stop_tasks();
    }
}

impl std::fmt::Debug for MqttClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttClient")
            .field("broker", &self.broker)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

async fn handshake(broker: SocketAddr, options: &MqttOptions) -> Result<TcpStream, MqttError> {
    let mut stream = TcpStream::connect(broker).await?;
    stream.set_nodelay(true)?;

    let connect = Packet::Connect(ConnectPacket {
        client_id: options.client_id.clone(),
        keep_alive: options.keep_alive_secs(),
        clean_session: options.clean_session,
    })
    .encode()?;
    stream.write_all(&connect).await?;
    trace!("CONNECT sent to {}", broker);

    match read_packet(&mut stream).await? {
        Packet::ConnAck(ack) if ack.return_code == ConnectReturnCode::Accepted => {
            debug!("CONNACK (session_present={})", ack.session_present);
            Ok(stream)
        }
        Packet::ConnAck(ack) => Err(MqttError::Refused(ack.return_code)),
        other => Err(MqttError::UnexpectedPacket(other.name())),
    }
}

async fn run_reader(mut reader: OwnedReadHalf, shared: Arc<Shared>, broker: SocketAddr) {
    loop {
        match read_packet(&mut reader).await {
            Ok(Packet::PubAck(ack)) => {
                if shared.inflight.lock().await.remove(&ack.packet_id) {
                    trace!("PUBACK {}", ack.packet_id);
                } else {
                    debug!("PUBACK for unknown packet id {}", ack.packet_id);
                }
            }
            Ok(Packet::PingResp) => trace!("PINGRESP"),
            Ok(other) => debug!("Ignoring {} from broker", other.name()),
            Err(MqttError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                if shared.mark_lost() {
                    error!("Broker {} closed the connection", broker);
                }
                return;
            }
            Err(e) => {
                if shared.mark_lost() {
                    error!("MQTT read from {} failed, session lost: {}", broker, e);
                }
                return;
            }
        }
    }
}

async fn run_keep_alive(writer: Arc<Mutex<OwnedWriteHalf>>, shared: Arc<Shared>, period: Duration) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    loop {
        ticker.tick().await;
        if !shared.is_connected() {
            break;
        }
        let bytes = [(crate::packet::PacketType::PingReq as u8) << 4, 0x00];
        if let Err(e) = writer.lock().await.write_all(&bytes).await {
            if shared.mark_lost() {
                warn!("Keep-alive failed, session lost: {}", e);
            }
            break;
        }
        trace!("PINGREQ");
    }
}
