//! Configuration system for the relaylink agent.

use relaylink_core::{AgentConfig, Announcement, RetryPolicy};
use relaylink_discovery::{DEFAULT_BROKER_PORT, DiscoveryConfig};
use relaylink_gpio::{DEFAULT_SYSFS_ROOT, DriverKind};
use relaylink_mqtt::{MqttOptions, QoS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// relaylink configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Relay output configuration
    #[serde(default)]
    pub relays: RelaysConfig,
    /// Broker discovery configuration
    #[serde(default)]
    pub discovery: DiscoverySection,
    /// Broker connection configuration
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Startup announcement
    #[serde(default)]
    pub announce: AnnounceConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Relay output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaysConfig {
    /// Comma-separated pin list, used when neither flag nor environment is set
    #[serde(default)]
    pub pins: String,
    /// Environment variable holding the pin list
    #[serde(default = "default_env_var")]
    pub env_var: String,
    /// Output driver
    #[serde(default)]
    pub driver: DriverKind,
    /// Root of the sysfs GPIO tree
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,
    /// Added to each pin to get its global sysfs number (512 for the SoC
    /// chip on Raspberry Pi kernels 6.6 and later)
    #[serde(default)]
    pub chip_base: u32,
}

/// Broker discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySection {
    /// Probe destination
    #[serde(default = "default_broadcast_addr")]
    pub broadcast_addr: String,
    /// Local address replies arrive on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Wait per probe in milliseconds
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
    /// Probes before giving up (0 = keep probing)
    #[serde(default = "default_probe_attempts")]
    pub probe_attempts: u32,
}

/// Broker connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker port combined with the discovered IP
    #[serde(default = "default_broker_port")]
    pub port: u16,
    /// MQTT client identifier (defaults to `relaylink-<pid>`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Keep-alive in seconds
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Bound on one connect attempt in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Pause between connect attempts in milliseconds
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

/// Startup announcement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnounceConfig {
    /// Publish the announcement after connecting
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Topic name
    #[serde(default = "default_announce_topic")]
    pub topic: String,
    /// Payload
    #[serde(default = "default_announce_payload")]
    pub payload: String,
    /// QoS (0 or 1)
    #[serde(default = "default_announce_qos")]
    pub qos: u8,
    /// Retain flag
    #[serde(default)]
    pub retain: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values

fn default_env_var() -> String {
    "RELAYS".to_string()
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from(DEFAULT_SYSFS_ROOT)
}

fn default_broadcast_addr() -> String {
    "255.255.255.255:10001".to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0:10002".to_string()
}

fn default_response_timeout_ms() -> u64 {
    5_000
}

fn default_probe_attempts() -> u32 {
    3
}

fn default_broker_port() -> u16 {
    DEFAULT_BROKER_PORT
}

fn default_keep_alive_secs() -> u64 {
    60
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_retry_interval_ms() -> u64 {
    2_000
}

fn default_true() -> bool {
    true
}

fn default_announce_topic() -> String {
    relaylink_core::DEFAULT_ANNOUNCE_TOPIC.to_string()
}

fn default_announce_payload() -> String {
    relaylink_core::DEFAULT_ANNOUNCE_PAYLOAD.to_string()
}

fn default_announce_qos() -> u8 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RelaysConfig {
    fn default() -> Self {
        Self {
            pins: String::new(),
            env_var: default_env_var(),
            driver: DriverKind::default(),
            sysfs_root: default_sysfs_root(),
            chip_base: 0,
        }
    }
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            broadcast_addr: default_broadcast_addr(),
            listen_addr: default_listen_addr(),
            response_timeout_ms: default_response_timeout_ms(),
            probe_attempts: default_probe_attempts(),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            port: default_broker_port(),
            client_id: None,
            keep_alive_secs: default_keep_alive_secs(),
            connect_timeout_ms: default_connect_timeout_ms(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            topic: default_announce_topic(),
            payload: default_announce_payload(),
            qos: default_announce_qos(),
            retain: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = self.to_toml()?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, contents)?;
        Ok(())
    }

    /// Render as TOML
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Get default config path
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("relaylink/config.toml")
    }

    /// Load config from the default path, or use defaults if there is no file.
    ///
    /// Nothing is written; `relaylink config --output` creates a file.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load_or_default() -> anyhow::Result<Self> {
        Self::load_from_or_default(Self::default_path())
    }

    /// Load `path` if it exists, otherwise return the defaults
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load_from_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if path.is_file() {
            Self::load(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Pick the relay list: `--relays` flag, then the environment variable,
    /// then `relays.pins`
    #[must_use]
    pub fn resolve_relays(&self, flag: Option<&str>, env: Option<String>) -> String {
        match (flag, env) {
            (Some(flag), _) => flag.to_string(),
            (None, Some(env)) => env,
            (None, None) => self.relays.pins.clone(),
        }
    }

    /// Discovery parameters
    ///
    /// # Errors
    ///
    /// Returns an error if an address does not parse or a value is out of range.
    pub fn discovery_config(&self) -> anyhow::Result<DiscoveryConfig> {
        let config = DiscoveryConfig::parse(
            &self.discovery.broadcast_addr,
            &self.discovery.listen_addr,
            self.broker.port,
        )?
        .with_response_timeout(Duration::from_millis(self.discovery.response_timeout_ms))
        .with_probe_attempts(self.discovery.probe_attempts);
        config.validate()?;
        Ok(config)
    }

    /// MQTT client options
    #[must_use]
    pub fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::default()
            .with_keep_alive(Duration::from_secs(self.broker.keep_alive_secs))
            .with_connect_timeout(Duration::from_millis(self.broker.connect_timeout_ms));
        if let Some(client_id) = &self.broker.client_id {
            options = options.with_client_id(client_id.clone());
        }
        options
    }

    /// Connect retry timing
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(Duration::from_millis(self.broker.retry_interval_ms))
    }

    /// Startup announcement, if enabled
    ///
    /// # Errors
    ///
    /// Returns an error if the QoS value is invalid.
    pub fn announcement(&self) -> anyhow::Result<Option<Announcement>> {
        if !self.announce.enabled {
            return Ok(None);
        }
        Ok(Some(Announcement {
            topic: self.announce.topic.clone(),
            payload: self.announce.payload.clone(),
            qos: QoS::from_u8(self.announce.qos)?,
            retain: self.announce.retain,
        }))
    }

    /// Everything the startup sequence needs
    ///
    /// # Errors
    ///
    /// Returns an error if any section is invalid.
    pub fn agent_config(&self, relays: String) -> anyhow::Result<AgentConfig> {
        Ok(AgentConfig {
            relays,
            discovery: self.discovery_config()?,
            retry: self.retry_policy(),
            announce: self.announcement()?,
        })
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.discovery_config()?;

        if self.relays.env_var.is_empty() {
            anyhow::bail!("relays.env_var must not be empty");
        }

        if self.broker.connect_timeout_ms == 0 {
            anyhow::bail!("broker.connect_timeout_ms must be greater than 0");
        }

        if self.broker.retry_interval_ms == 0 {
            anyhow::bail!("broker.retry_interval_ms must be greater than 0");
        }

        if self.broker.keep_alive_secs > u64::from(u16::MAX) {
            anyhow::bail!("broker.keep_alive_secs must be at most {}", u16::MAX);
        }

        if let Some(announcement) = self.announcement()? {
            announcement.validate()?;
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.relays.env_var, "RELAYS");
        assert_eq!(config.relays.driver, DriverKind::Sysfs);
        assert_eq!(config.discovery.broadcast_addr, "255.255.255.255:10001");
        assert_eq!(config.discovery.listen_addr, "0.0.0.0:10002");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.broker.retry_interval_ms, 2_000);
        assert!(config.announce.enabled);
        assert_eq!(config.announce.topic, "testChannel/Topic");
        assert_eq!(config.announce.payload, "testMessage");
        assert_eq!(config.announce.qos, 1);
        assert!(!config.announce.retain);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.discovery.broadcast_addr = "not-an-address".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.announce.qos = 2;
        assert!(config.validate().is_err());

        config = Config::default();
        config.announce.topic = "relays/+".to_string();
        assert!(config.validate().is_err());

        config.announce.enabled = false;
        assert!(config.validate().is_ok());

        config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.broker.retry_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.discovery.listen_addr, deserialized.discovery.listen_addr);
        assert_eq!(config.broker.port, deserialized.broker.port);
        assert_eq!(config.announce.topic, deserialized.announce.topic);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [relays]
            pins = "17,18"
            driver = "memory"

            [broker]
            port = 1884
            "#,
        )
        .unwrap();

        assert_eq!(config.relays.pins, "17,18");
        assert_eq!(config.relays.driver, DriverKind::Memory);
        assert_eq!(config.relays.env_var, "RELAYS");
        assert_eq!(config.broker.port, 1884);
        assert_eq!(config.broker.keep_alive_secs, 60);
        assert_eq!(config.discovery.probe_attempts, 3);
        assert_eq!(config.discovery_config().unwrap().broker_port, 1884);
    }

    #[test]
    fn test_relay_precedence() {
        let mut config = Config::default();
        config.relays.pins = "1".to_string();

        assert_eq!(config.resolve_relays(Some("3"), Some("2".to_string())), "3");
        assert_eq!(config.resolve_relays(None, Some("2".to_string())), "2");
        assert_eq!(config.resolve_relays(None, None), "1");
        assert_eq!(config.resolve_relays(None, Some(String::new())), "");
    }

    #[test]
    fn test_conversions() {
        let mut config = Config::default();
        config.broker.client_id = Some("bench-01".to_string());
        config.broker.retry_interval_ms = 750;
        config.announce.qos = 0;

        let options = config.mqtt_options();
        assert_eq!(options.client_id, "bench-01");
        assert_eq!(options.keep_alive, Duration::from_secs(60));
        assert_eq!(config.retry_policy().interval, Duration::from_millis(750));

        let agent = config.agent_config("4".to_string()).unwrap();
        assert_eq!(agent.relays, "4");
        assert_eq!(agent.announce.unwrap().qos, QoS::AtMostOnce);
        assert_eq!(agent.discovery.response_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        let mut config = Config::default();
        config.relays.pins = "5,6".to_string();

        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();

        assert_eq!(loaded.relays.pins, "5,6");
        assert!(Config::load(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relaylink/config.toml");

        let config = Config::load_from_or_default(&path).unwrap();

        assert_eq!(config.broker.port, 1883);
        assert!(!path.exists());
        assert!(!dir.path().join("relaylink").exists());
    }

    #[test]
    fn test_unwritable_config_dir_still_loads_defaults() {
        // A config dir nested under a regular file can never be created
        let blocker = tempfile::NamedTempFile::new().unwrap();
        let path = blocker.path().join("relaylink/config.toml");

        let config = Config::load_from_or_default(&path).unwrap();

        assert_eq!(config.discovery.probe_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_existing_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[broker]\nport = 1884\n").unwrap();

        let config = Config::load_from_or_default(&path).unwrap();

        assert_eq!(config.broker.port, 1884);
    }

    #[test]
    fn test_chip_base_from_file() {
        let config: Config = toml::from_str("[relays]\npins = \"17\"\nchip_base = 512\n").unwrap();
        assert_eq!(config.relays.chip_base, 512);
        assert_eq!(Config::default().relays.chip_base, 0);
    }
}
