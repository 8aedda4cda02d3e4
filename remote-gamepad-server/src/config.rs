//! Loads and validates the server configuration from a TOML file.

use crate::error::ConfigError;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default)]
    pub transport: Transport,

    /// Used by the `tcp` transport
    #[serde(default = "default_listen_address")]
    pub listen_address: SocketAddr,

    /// Used by the `rfcomm` transport
    #[serde(default = "default_rfcomm_channel")]
    pub rfcomm_channel: u8,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub axes: AxesConfig,
}

/// How handhelds reach the server.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Tcp,
    /// Bluetooth RFCOMM, Linux only.
    Rfcomm,
}

/// Virtual device configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    #[serde(default = "default_device_name")]
    pub name: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct AxesConfig {
    #[serde(default)]
    pub x: AxisConfig,

    #[serde(default)]
    pub y: AxisConfig,
}

/// Calibration for one stick axis.
///
/// `physical_min` and `physical_max` are the raw readings the handheld
/// actually reports at full deflection; they need not be symmetric.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct AxisConfig {
    #[serde(default = "default_physical_min")]
    pub physical_min: i16,

    #[serde(default = "default_physical_max")]
    pub physical_max: i16,

    /// Raw readings with `abs(raw) < dead_zone` are ignored in favor of the d-pad.
    #[serde(default = "default_dead_zone")]
    pub dead_zone: u16,

    #[serde(default)]
    pub orientation: Orientation,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// `physical_min` maps to the negative end of the virtual axis.
    #[default]
    Normal,
    /// `physical_min` maps to the positive end of the virtual axis.
    Inverted,
}

fn default_listen_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}
fn default_rfcomm_channel() -> u8 {
    3
}
fn default_log_level() -> String {
    "debug".to_string()
}
fn default_device_name() -> String {
    "Remote Gamepad".to_string()
}
fn default_physical_min() -> i16 {
    -320
}
fn default_physical_max() -> i16 {
    266
}
fn default_dead_zone() -> u16 {
    22
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            listen_address: default_listen_address(),
            rfcomm_channel: default_rfcomm_channel(),
            log_level: default_log_level(),
            device: DeviceConfig::default(),
            axes: AxesConfig::default(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: default_device_name(),
        }
    }
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            physical_min: default_physical_min(),
            physical_max: default_physical_max(),
            dead_zone: default_dead_zone(),
            orientation: Orientation::default(),
        }
    }
}

impl ServerConfig {
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
        let config: ServerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.transport == Transport::Rfcomm {
            if cfg!(not(target_os = "linux")) {
                return Err(ConfigError::Invalid(
                    "the rfcomm transport is only available on Linux".to_string(),
                ));
            }

            if !(1..=30).contains(&self.rfcomm_channel) {
                return Err(ConfigError::Invalid(
                    "rfcomm_channel must be between 1 and 30".to_string(),
                ));
            }
        }

        if self.device.name.is_empty() {
            return Err(ConfigError::Invalid("device name cannot be empty".to_string()));
        }

        // uinput rejects longer names
        if self.device.name.len() >= 80 {
            return Err(ConfigError::Invalid(
                "device name must be shorter than 80 bytes".to_string(),
            ));
        }

        for (name, axis) in [("x", &self.axes.x), ("y", &self.axes.y)] {
            if axis.physical_min >= axis.physical_max {
                return Err(ConfigError::Invalid(format!(
                    "axes.{name}: physical_min must be less than physical_max"
                )));
            }
        }

        Ok(())
    }
}
