//! Error taxonomy.
//!
//! Per-device failures ([`ExecFailure`]) never escape the executor as
//! errors; they are rendered into the `error` field of a `CommandResult`.
//! [`OracleError`] is the only class that can end a run early, and the
//! engine absorbs it into a degraded outcome.

use thiserror::Error;

/// Why running one command on one device failed.
#[derive(Debug, Error)]
pub enum ExecFailure {
    #[error("command not allowed: '{0}' is not on the allow-list")]
    NotAllowed(String),

    #[error("unknown device: '{0}' is not in the inventory")]
    UnknownDevice(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("parse failed: '{command}' produced no parseable output")]
    ParseEmpty { command: String },

    #[error("parse failed: no parser for '{command}' on platform '{platform}'")]
    ParserUnsupported { command: String, platform: String },

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// Why an oracle call failed.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle transport error: {0}")]
    Transport(String),

    #[error("oracle API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("oracle returned undecodable output: {0}")]
    Decode(String),
}

/// Configuration loading problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}
