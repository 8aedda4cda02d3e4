//! Loads and validates the client configuration from a TOML file.

use crate::error::ConfigError;
use crate::input_state::KeyMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    /// `host:port` of the remote-gamepad server
    #[serde(default = "default_server_address")]
    pub server_address: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_send_rate_hz")]
    pub send_rate_hz: u32,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Physical key code -> key name
    #[serde(default = "default_keymap")]
    pub keymap: HashMap<String, String>,
}

/// Reconnect backoff configuration
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    #[serde(default = "default_backoff_floor_ms")]
    pub floor_ms: u64,

    #[serde(default = "default_backoff_ceiling_ms")]
    pub ceiling_ms: u64,

    #[serde(default = "default_backoff_factor")]
    pub factor: f64,
}

fn default_server_address() -> String {
    "192.168.0.4:5000".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_send_rate_hz() -> u32 {
    120
}
fn default_connect_timeout_ms() -> u64 {
    1000
}
fn default_send_timeout_ms() -> u64 {
    500
}
fn default_backoff_floor_ms() -> u64 {
    200
}
fn default_backoff_ceiling_ms() -> u64 {
    2000
}
fn default_backoff_factor() -> f64 {
    1.5
}

pub(crate) fn default_keymap() -> HashMap<String, String> {
    let mut keymap: HashMap<String, String> = [
        (16, "up"),
        (17, "down"),
        (14, "left"),
        (15, "right"),
        (165, "start"),
        (167, "1"),
    ]
    .into_iter()
    .map(|(code, name)| (code.to_string(), name.to_string()))
    .collect();

    // Number keys 1-9
    for digit in 1..=9u32 {
        keymap.insert((48 + digit).to_string(), digit.to_string());
    }
    keymap
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: default_server_address(),
            log_level: default_log_level(),
            send_rate_hz: default_send_rate_hz(),
            connect_timeout_ms: default_connect_timeout_ms(),
            send_timeout_ms: default_send_timeout_ms(),
            backoff: BackoffConfig::default(),
            keymap: default_keymap(),
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            floor_ms: default_backoff_floor_ms(),
            ceiling_ms: default_backoff_ceiling_ms(),
            factor: default_backoff_factor(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, fails to parse, or holds
    /// out-of-range values.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn send_period(&self) -> Duration {
        Duration::from_secs(1) / self.send_rate_hz
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn keymap(&self) -> Result<KeyMap, ConfigError> {
        KeyMap::from_names(&self.keymap)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server_address.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "server_address cannot be empty".to_string(),
            ));
        }

        if self.send_rate_hz == 0 || self.send_rate_hz > 1000 {
            return Err(ConfigError::Invalid(
                "send_rate_hz must be between 1 and 1000".to_string(),
            ));
        }

        if self.connect_timeout_ms == 0 || self.connect_timeout_ms > 60000 {
            return Err(ConfigError::Invalid(
                "connect_timeout_ms must be between 1 and 60000".to_string(),
            ));
        }

        if self.send_timeout_ms == 0 || self.send_timeout_ms > 60000 {
            return Err(ConfigError::Invalid(
                "send_timeout_ms must be between 1 and 60000".to_string(),
            ));
        }

        if self.backoff.floor_ms == 0 {
            return Err(ConfigError::Invalid(
                "backoff.floor_ms must be greater than 0".to_string(),
            ));
        }

        if self.backoff.floor_ms > self.backoff.ceiling_ms {
            return Err(ConfigError::Invalid(
                "backoff.floor_ms must not exceed backoff.ceiling_ms".to_string(),
            ));
        }

        if !self.backoff.factor.is_finite() || self.backoff.factor < 1.0 {
            return Err(ConfigError::Invalid(
                "backoff.factor must be at least 1.0".to_string(),
            ));
        }

        self.keymap()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_uses_defaults() {
        let config = ClientConfig::parse("").unwrap();

        assert_eq!(config.server_address, "192.168.0.4:5000");
        assert_eq!(config.send_rate_hz, 120);
        assert_eq!(config.connect_timeout(), Duration::from_secs(1));
        assert_eq!(config.backoff, BackoffConfig::default());
        assert_eq!(config.keymap.len(), 15);
    }

    #[test]
    fn send_period_follows_rate() {
        let config = ClientConfig::parse("send_rate_hz = 50").unwrap();

        assert_eq!(config.send_period(), Duration::from_millis(20));
    }

    #[test]
    fn custom_keymap_replaces_default() {
        let config = ClientConfig::parse(
            r#"
            [keymap]
            38 = "up"
            40 = "down"
            "#,
        )
        .unwrap();

        assert_eq!(config.keymap.len(), 2);
        assert!(config.keymap().unwrap().get(38).is_some());
        assert!(config.keymap().unwrap().get(16).is_none());
    }

    #[test]
    fn rejects_zero_rate() {
        let result = ClientConfig::parse("send_rate_hz = 0");

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_shrinking_backoff() {
        let result = ClientConfig::parse("[backoff]\nfactor = 0.5\n");

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_floor_above_ceiling() {
        let result = ClientConfig::parse("[backoff]\nfloor_ms = 3000\nceiling_ms = 2000\n");

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_unknown_key_name() {
        let result = ClientConfig::parse("[keymap]\n50 = \"jump\"\n");

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server_address = \"10.0.0.2:5000\"").unwrap();

        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.server_address, "10.0.0.2:5000");
    }
}
