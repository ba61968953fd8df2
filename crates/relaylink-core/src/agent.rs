//! Startup sequence: relays, discovery, connect, announce.

use crate::context::{Announcement, AppContext};
use crate::error::{AgentError, Result};
use crate::locator::{BrokerConnector, BrokerLocator};
use crate::retry::RetryPolicy;
use crate::shutdown::Shutdown;
use relaylink_discovery::DiscoveryConfig;
use relaylink_gpio::{OutputDriver, RelayBank};
use tracing::{info, warn};

/// Everything the startup sequence needs besides the driver and connector
#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    /// Comma-separated relay pin list
    pub relays: String,
    /// Broker discovery parameters
    pub discovery: DiscoveryConfig,
    /// Connect retry timing
    pub retry: RetryPolicy,
    /// Message published after connecting (`None` to skip)
    pub announce: Option<Announcement>,
}

/// Run the startup sequence.
///
/// Relays are initialized first; discovery and connect follow in order. If
/// a later step fails, the relay bank is dropped and the driver released
/// before the error is returned.
///
/// # Errors
///
/// Returns `AgentError::Gpio` for driver failures, `AgentError::Discovery`
/// if no broker is found, `AgentError::Cancelled` on shutdown, or the
/// announcement error.
pub async fn start<C: BrokerConnector>(
    config: &AgentConfig,
    driver: Box<dyn OutputDriver>,
    connector: C,
    shutdown: &Shutdown,
) -> Result<AppContext<C>> {
    if let Some(announcement) = &config.announce {
        announcement.validate()?;
    }

    // Drivers may block (sysfs export polling), so keep setup off the async workers
    let list = config.relays.clone();
    let relays = match tokio::task::spawn_blocking(move || RelayBank::setup(driver, &list)).await {
        Ok(bank) => bank?,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => return Err(AgentError::Cancelled),
    };
    if !relays.errors().is_empty() {
        warn!(
            "{} relay token(s) skipped: {:?}",
            relays.errors().len(),
            config.relays
        );
    }

    let mut locator = BrokerLocator::new(config.discovery.clone(), connector)
        .with_retry_policy(config.retry);
    let (broker, connection) = locator.locate(shutdown).await?;

    let context = AppContext::new(relays, broker, connection, locator);
    if let Some(announcement) = &config.announce {
        context.announce(announcement).await?;
    }

    info!(
        "Agent ready: {} relay line(s), broker {}",
        context.relays().len(),
        context.broker()
    );
    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::BrokerConnection;
    use async_trait::async_trait;
    use relaylink_discovery::BrokerEndpoint;
    use relaylink_gpio::{GpioError, Level, MemoryDriver, OutputHandle};
    use relaylink_mqtt::QoS;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread::ThreadId;
    use std::time::Duration;
    use tokio::net::UdpSocket;

    struct Connected;

    #[async_trait]
    impl BrokerConnection for Connected {
        fn is_connected(&self) -> bool {
            true
        }

        async fn publish(&self, _: &str, _: QoS, _: bool, _: &[u8]) -> Result<()> {
            Ok(())
        }

        async fn disconnect(&self) -> Result<()> {
            Ok(())
        }

        async fn closed(&self) {
            std::future::pending::<()>().await
        }
    }

    #[derive(Clone, Default)]
    struct CountingConnector {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl BrokerConnector for CountingConnector {
        type Connection = Connected;

        async fn connect(&self, _: BrokerEndpoint) -> Result<Connected> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Connected)
        }
    }

    async fn responder() -> (DiscoveryConfig, tokio::task::JoinHandle<()>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = DiscoveryConfig {
            broadcast_addr: socket.local_addr().unwrap(),
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            broker_port: 1883,
            response_timeout: Duration::from_secs(2),
            probe_attempts: 1,
        };
        let task = tokio::spawn(async move {
            let mut buf = [0u8; 16];
            let (_, from) = socket.recv_from(&mut buf).await.unwrap();
            socket.send_to(b"broker", from).await.unwrap();
        });
        (config, task)
    }

    #[tokio::test]
    async fn test_start_initializes_relays_then_connects() {
        let (discovery, task) = responder().await;
        let driver = MemoryDriver::new();
        let state = driver.state();
        let connector = CountingConnector::default();
        let config = AgentConfig {
            relays: "4".to_string(),
            discovery,
            announce: Some(Announcement::default()),
            ..AgentConfig::default()
        };

        let ctx = start(&config, Box::new(driver), connector.clone(), &Shutdown::new())
            .await
            .unwrap();
        task.await.unwrap();

        assert_eq!(state.level(4), Some(Level::High));
        assert_eq!(ctx.broker().to_string(), "127.0.0.1:1883");
        assert_eq!(connector.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.metrics().attempts, 1);
    }

    #[tokio::test]
    async fn test_discovery_failure_releases_driver() {
        let driver = MemoryDriver::new();
        let state = driver.state();
        let mut config = AgentConfig {
            relays: "4".to_string(),
            ..AgentConfig::default()
        };
        config.discovery.broker_port = 0;

        let err = start(&config, Box::new(driver), CountingConnector::default(), &Shutdown::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Discovery(_)));
        assert!(err.is_fatal());
        assert_eq!(state.close_count(), 1);
    }

    #[tokio::test]
    async fn test_line_failure_is_fatal() {
        let driver = MemoryDriver::new().failing_pin(5);
        let state = driver.state();
        let config = AgentConfig {
            relays: "4,5".to_string(),
            ..AgentConfig::default()
        };

        let err = start(&config, Box::new(driver), CountingConnector::default(), &Shutdown::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Gpio(GpioError::Line { pin: 5, .. })));
        assert_eq!(state.close_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_before_discovery() {
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let err = start(
            &AgentConfig::default(),
            Box::new(MemoryDriver::new()),
            CountingConnector::default(),
            &shutdown,
        )
        .await
        .unwrap_err();

        assert!(err.is_cancelled());
    }

    /// Records which thread configured each line
    struct ThreadRecordingDriver {
        threads: Arc<Mutex<Vec<ThreadId>>>,
        closed: bool,
    }

    impl OutputDriver for ThreadRecordingDriver {
        fn configure_output(&mut self, pin: u32) -> relaylink_gpio::GpioResult<OutputHandle> {
            self.threads.lock().unwrap().push(std::thread::current().id());
            Ok(OutputHandle::new(pin))
        }

        fn write(&mut self, _: OutputHandle, _: Level) -> relaylink_gpio::GpioResult<()> {
            Ok(())
        }

        fn close(&mut self) -> relaylink_gpio::GpioResult<()> {
            self.closed = true;
            Ok(())
        }

        fn is_closed(&self) -> bool {
            self.closed
        }

        fn name(&self) -> &'static str {
            "thread-recording"
        }
    }

    #[tokio::test]
    async fn test_relay_setup_runs_off_the_runtime_thread() {
        let (discovery, task) = responder().await;
        let threads = Arc::new(Mutex::new(Vec::new()));
        let driver = ThreadRecordingDriver {
            threads: Arc::clone(&threads),
            closed: false,
        };
        let config = AgentConfig {
            relays: "4,5".to_string(),
            discovery,
            ..AgentConfig::default()
        };

        let ctx = start(&config, Box::new(driver), CountingConnector::default(), &Shutdown::new())
            .await
            .unwrap();
        task.await.unwrap();

        let threads = threads.lock().unwrap().clone();
        assert_eq!(threads.len(), 2);
        assert!(threads.iter().all(|id| *id != std::thread::current().id()));
        assert_eq!(ctx.relays().pins(), vec![4, 5]);
    }
}
