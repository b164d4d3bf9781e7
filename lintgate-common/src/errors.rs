//! Error types for the coordination layer.
//!
//! Only two conditions ever reach the end user as a message: a failing or
//! timed-out validation run, which are not errors at this layer but
//! [`Outcome`](crate::types::Outcome)s. Everything here is either handled
//! silently (transport failures trigger the fallback, lock storage failures
//! read as contention) or surfaced to the operator with exit code 1.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure talking to the daemon. Never shown to the user; triggers the
/// in-process fallback.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("daemon socket not found at {}", path.display())]
    SocketNotFound { path: PathBuf },

    #[error("daemon connect timed out after {}ms", timeout.as_millis())]
    ConnectTimeout { timeout: Duration },

    #[error("daemon response timed out after {}s", timeout.as_secs())]
    ResponseTimeout { timeout: Duration },

    #[error("daemon I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("daemon closed the connection without a response")]
    Closed,

    #[error("message exceeded {limit} byte limit")]
    FrameTooLarge { limit: usize },

    #[error("malformed message: {0}")]
    Malformed(#[source] serde_json::Error),
}

/// Failure reading or writing persisted lock records.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("lock store I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode lock record: {0}")]
    Encode(#[source] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure loading or persisting the skip registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry file exists but cannot be parsed. Fatal: the user's
    /// configured skip list must never be silently discarded.
    #[error("skip registry at {} is corrupted: {source}", path.display())]
    Corrupted {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("skip registry I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode skip registry: {0}")]
    Encode(#[source] serde_json::Error),
}

impl RegistryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Invalid request parameters.
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("unknown method '{0}'")]
    UnknownMethod(String),

    #[error("unknown check type '{0}' (expected lint or test)")]
    UnknownCheck(String),

    #[error("invalid params: {0}")]
    Invalid(#[source] serde_json::Error),

    #[error("directory must be absolute: {}", .0.display())]
    RelativeDir(PathBuf),
}

/// Failure loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid environment: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Env(Vec<crate::config::EnvError>),
}
