//! Configuration for the gateway bridge
//!
//! Loaded from a TOML file. Broker credentials may be given literally or
//! through environment variables; the environment wins when both are set.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const MIN_KEEP_ALIVE_SECS: u64 = 5;

/// Main bridge configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    pub mqtt: MqttSection,
    #[serde(default)]
    pub bridge: BridgeSection,
    #[serde(default)]
    pub reconnect: ReconnectSection,
}

/// Broker connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// MQTT broker URL with protocol and port
    pub broker_url: String,
    /// Fixed prefix of every topic the bridge handles
    pub topic_prefix: String,
    /// Client identifier, constant per deployment
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Literal username
    pub username: Option<String>,
    /// Literal password
    pub password: Option<String>,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
    /// Keep-alive interval in seconds (default: 120)
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    /// Upper bound on a single publish round trip (default: 30)
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_secs: u64,
}

fn default_client_id() -> String {
    "gateway-bridge".to_string()
}

fn default_keep_alive() -> u64 {
    120
}

fn default_publish_timeout() -> u64 {
    30
}

impl MqttSection {
    /// Resolve broker credentials.
    ///
    /// Returns `None` when no username is configured, in which case the
    /// connection is anonymous.
    pub fn credentials(&self) -> Option<(String, String)> {
        let username = get_env_var_optional(self.username_env.as_ref())
            .or_else(|| self.username.clone())
            .filter(|u| !u.is_empty())?;
        let password = get_env_var_optional(self.password_env.as_ref())
            .or_else(|| self.password.clone())
            .unwrap_or_default();
        Some((username, password))
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }
}

/// Bridge loop settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeSection {
    /// Sleep between iterations when the outbound queue is empty
    #[serde(default = "default_idle_interval")]
    pub idle_interval_ms: u64,
    /// Maximum broker events handled per iteration
    #[serde(default = "default_event_batch_limit")]
    pub event_batch_limit: usize,
    /// How long close() waits for the loop to finish
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_idle_interval() -> u64 {
    10
}

fn default_event_batch_limit() -> usize {
    64
}

fn default_shutdown_timeout() -> u64 {
    5
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            idle_interval_ms: default_idle_interval(),
            event_batch_limit: default_event_batch_limit(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl BridgeSection {
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Reconnection backoff settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconnectSection {
    /// Delays for the first attempts, in milliseconds
    #[serde(default = "default_backoff")]
    pub backoff_ms: Vec<u64>,
    /// Delay once the pattern is exhausted
    #[serde(default = "default_sustained_delay")]
    pub sustained_delay_ms: u64,
}

fn default_backoff() -> Vec<u64> {
    vec![0, 250, 1000, 2500]
}

fn default_sustained_delay() -> u64 {
    5000
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            backoff_ms: default_backoff(),
            sustained_delay_ms: default_sustained_delay(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Invalid topic prefix: {0}")]
    InvalidTopicPrefix(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BridgeConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field values that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_broker_url(&self.mqtt.broker_url)?;
        validate_topic_prefix(&self.mqtt.topic_prefix)?;

        if self.mqtt.client_id.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "client_id must not be empty".to_string(),
            ));
        }
        if self.mqtt.keep_alive_secs < MIN_KEEP_ALIVE_SECS {
            return Err(ConfigError::InvalidConfig(format!(
                "keep_alive_secs must be at least {MIN_KEEP_ALIVE_SECS}, got {}",
                self.mqtt.keep_alive_secs
            )));
        }
        if self.mqtt.publish_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "publish_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if !(1..=1000).contains(&self.bridge.idle_interval_ms) {
            return Err(ConfigError::InvalidConfig(format!(
                "idle_interval_ms must be between 1 and 1000, got {}",
                self.bridge.idle_interval_ms
            )));
        }
        if self.bridge.event_batch_limit == 0 {
            return Err(ConfigError::InvalidConfig(
                "event_batch_limit must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Copy of the configuration that is safe to print
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.mqtt.password.is_some() {
            config.mqtt.password = Some("***".to_string());
        }
        config
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[mqtt]
broker_url = "mqtt://localhost:1883"
topic_prefix = "home"
"#;
        Self::from_toml_str(toml_content).expect("Test config should parse")
    }
}

fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
    env_var_name.and_then(|name| std::env::var(name).ok())
}

fn validate_broker_url(broker_url: &str) -> Result<(), ConfigError> {
    let url =
        url::Url::parse(broker_url).map_err(|_| ConfigError::InvalidBrokerUrl(broker_url.into()))?;

    match url.scheme() {
        "mqtt" | "mqtts" | "tcp" | "ssl" => {}
        other => {
            return Err(ConfigError::InvalidBrokerUrl(format!(
                "unsupported scheme '{other}' in {broker_url}"
            )));
        }
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::InvalidBrokerUrl(broker_url.to_string()));
    }

    Ok(())
}

/// Validate the topic prefix: non-empty, no wildcards, no trailing slash
fn validate_topic_prefix(prefix: &str) -> Result<(), ConfigError> {
    if prefix.is_empty() {
        return Err(ConfigError::InvalidTopicPrefix(
            "prefix must not be empty".to_string(),
        ));
    }
    if prefix.contains(['+', '#']) {
        return Err(ConfigError::InvalidTopicPrefix(format!(
            "'{prefix}' must not contain wildcards"
        )));
    }
    if prefix.ends_with('/') {
        return Err(ConfigError::InvalidTopicPrefix(format!(
            "'{prefix}' must not end with '/'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let config = BridgeConfig::test_config();

        assert_eq!(config.mqtt.broker_url, "mqtt://localhost:1883");
        assert_eq!(config.mqtt.topic_prefix, "home");
        assert_eq!(config.mqtt.client_id, "gateway-bridge");
        assert_eq!(config.mqtt.keep_alive_secs, 120);
        assert_eq!(config.mqtt.publish_timeout_secs, 30);
        assert_eq!(config.bridge.idle_interval_ms, 10);
        assert_eq!(config.bridge.event_batch_limit, 64);
        assert_eq!(config.bridge.shutdown_timeout_secs, 5);
        assert_eq!(config.reconnect.backoff_ms, vec![0, 250, 1000, 2500]);
        assert_eq!(config.reconnect.sustained_delay_ms, 5000);
    }

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[mqtt]
broker_url = "mqtts://broker.example.com:8883"
topic_prefix = "site/gw1"
client_id = "RFLinkGateway"
username = "bridge"
password = "hunter2"
keep_alive_secs = 60
publish_timeout_secs = 5

[bridge]
idle_interval_ms = 20
event_batch_limit = 8
shutdown_timeout_secs = 3

[reconnect]
backoff_ms = [10, 20]
sustained_delay_ms = 100
"#;

        let config = BridgeConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.mqtt.client_id, "RFLinkGateway");
        assert_eq!(config.mqtt.keep_alive(), Duration::from_secs(60));
        assert_eq!(config.mqtt.publish_timeout(), Duration::from_secs(5));
        assert_eq!(config.bridge.idle_interval(), Duration::from_millis(20));
        assert_eq!(config.bridge.shutdown_timeout(), Duration::from_secs(3));
        assert_eq!(config.reconnect.backoff_ms, vec![10, 20]);
        assert_eq!(
            config.mqtt.credentials(),
            Some(("bridge".to_string(), "hunter2".to_string()))
        );
    }

    #[test]
    fn test_anonymous_when_no_username() {
        let config = BridgeConfig::test_config();
        assert_eq!(config.mqtt.credentials(), None);
    }

    #[test]
    fn test_empty_username_is_anonymous() {
        let mut config = BridgeConfig::test_config();
        config.mqtt.username = Some(String::new());
        config.mqtt.password = Some("ignored".to_string());
        assert_eq!(config.mqtt.credentials(), None);
    }

    #[test]
    fn test_username_without_password() {
        let mut config = BridgeConfig::test_config();
        config.mqtt.username = Some("bridge".to_string());
        assert_eq!(
            config.mqtt.credentials(),
            Some(("bridge".to_string(), String::new()))
        );
    }

    #[test]
    fn test_env_credentials_override_literals() {
        std::env::set_var("GATEWAY_BRIDGE_TEST_USER", "env-user");
        std::env::set_var("GATEWAY_BRIDGE_TEST_PASS", "env-pass");

        let mut config = BridgeConfig::test_config();
        config.mqtt.username = Some("literal".to_string());
        config.mqtt.password = Some("literal".to_string());
        config.mqtt.username_env = Some("GATEWAY_BRIDGE_TEST_USER".to_string());
        config.mqtt.password_env = Some("GATEWAY_BRIDGE_TEST_PASS".to_string());

        assert_eq!(
            config.mqtt.credentials(),
            Some(("env-user".to_string(), "env-pass".to_string()))
        );
    }

    #[test]
    fn test_unset_env_falls_back_to_literal() {
        let mut config = BridgeConfig::test_config();
        config.mqtt.username = Some("literal".to_string());
        config.mqtt.username_env = Some("GATEWAY_BRIDGE_TEST_UNSET_VAR".to_string());

        let (username, _) = config.mqtt.credentials().unwrap();
        assert_eq!(username, "literal");
    }

    #[test]
    fn test_invalid_broker_url() {
        assert!(matches!(
            validate_broker_url("invalid-url"),
            Err(ConfigError::InvalidBrokerUrl(_))
        ));
        assert!(matches!(
            validate_broker_url("http://localhost:1883"),
            Err(ConfigError::InvalidBrokerUrl(_))
        ));
        assert!(validate_broker_url("mqtt://localhost").is_ok());
        assert!(validate_broker_url("mqtts://broker:8883").is_ok());
    }

    #[test]
    fn test_invalid_topic_prefix() {
        assert!(validate_topic_prefix("").is_err());
        assert!(validate_topic_prefix("home/+").is_err());
        assert!(validate_topic_prefix("home/#").is_err());
        assert!(validate_topic_prefix("home/").is_err());
        assert!(validate_topic_prefix("home").is_ok());
        assert!(validate_topic_prefix("site/gw1").is_ok());
    }

    #[test]
    fn test_idle_interval_bounds() {
        let mut config = BridgeConfig::test_config();

        config.bridge.idle_interval_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));

        config.bridge.idle_interval_ms = 1001;
        assert!(config.validate().is_err());

        config.bridge.idle_interval_ms = 1000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = BridgeConfig::test_config();
        config.mqtt.keep_alive_secs = 0;
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::test_config();
        config.mqtt.keep_alive_secs = 4;
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::test_config();
        config.mqtt.publish_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::test_config();
        config.bridge.event_batch_limit = 0;
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::test_config();
        config.mqtt.client_id = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redacted_hides_password() {
        let mut config = BridgeConfig::test_config();
        config.mqtt.password = Some("hunter2".to_string());

        let redacted = config.redacted();
        assert_eq!(redacted.mqtt.password.as_deref(), Some("***"));
        assert_eq!(config.mqtt.password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_missing_mqtt_section_fails() {
        let result = BridgeConfig::from_toml_str("[bridge]\nidle_interval_ms = 10\n");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }
}
