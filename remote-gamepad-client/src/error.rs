use std::path::PathBuf;
use thiserror::Error;

/// Failures on the link to the server. None of these are fatal: the
/// connection manager retries connects and a failed send drops the link.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },

    #[error("timed out connecting to {0}")]
    ConnectTimeout(String),

    #[error("failed to send frame: {0}")]
    Send(#[source] std::io::Error),

    #[error("timed out sending frame")]
    SendTimeout,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventParseError {
    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    #[error("missing argument for `{0}`")]
    MissingArgument(&'static str),

    #[error("invalid argument `{0}`")]
    InvalidArgument(String),
}
