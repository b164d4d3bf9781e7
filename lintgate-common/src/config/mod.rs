//! Configuration for the hook CLI and the daemon.
//!
//! Layers, lowest precedence first: built-in defaults, the TOML config file,
//! `LINTGATE_*` environment variables, then command-line flags (applied by
//! the binaries).

pub mod env;

pub use env::{EnvError, EnvParser};

use crate::errors::ConfigError;
use crate::paths::Paths;
use crate::types::CheckType;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Extra time a holder may keep a lock beyond its run timeout before the
/// lock is considered abandoned.
pub const STALE_GRACE: Duration = Duration::from_secs(30);

/// Longest a live holder running with `timeout` may keep the lock before
/// it is reclaimed.
pub fn max_hold(timeout: Duration) -> Duration {
    timeout.saturating_add(STALE_GRACE)
}

/// Upper bound accepted for any duration from the environment.
const MAX_ENV_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HookConfig {
    pub general: GeneralConfig,
    pub lint: CheckConfig,
    pub test: CheckConfig,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            lint: CheckConfig::with_timeout(Duration::from_secs(30)),
            test: CheckConfig::with_timeout(Duration::from_secs(60)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralConfig {
    /// Daemon socket; defaults to the per-user runtime path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,
    #[serde(with = "humantime_str")]
    pub connect_timeout: Duration,
    /// Always execute in-process.
    pub no_daemon: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            connect_timeout: Duration::from_millis(250),
            no_daemon: false,
        }
    }
}

/// Timing for one check type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckConfig {
    #[serde(with = "humantime_str")]
    pub timeout: Duration,
    #[serde(with = "humantime_str")]
    pub cooldown: Duration,
}

impl CheckConfig {
    fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            cooldown: Duration::from_secs(2),
        }
    }
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }
}

impl HookConfig {
    /// Defaults, then the config file under `paths`, then the environment.
    pub fn load(paths: &Paths) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(&paths.config_file())?;
        config.apply_env()?;
        Ok(config)
    }

    /// Defaults overlaid with `path`. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay `LINTGATE_*` variables. All invalid variables are reported
    /// together.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        let mut parser = EnvParser::new();

        if let Some(socket) = parser.get_path("SOCKET") {
            self.general.socket_path = Some(socket);
        }
        if let Some(no_daemon) = parser.get_bool("NO_DAEMON") {
            self.general.no_daemon = no_daemon;
        }
        if let Some(timeout) = parser.get_duration_ms("CONNECT_TIMEOUT_MS", MAX_ENV_DURATION) {
            self.general.connect_timeout = timeout;
        }
        if let Some(timeout) = parser.get_duration_ms("LINT_TIMEOUT_MS", MAX_ENV_DURATION) {
            self.lint.timeout = timeout;
        }
        if let Some(timeout) = parser.get_duration_ms("TEST_TIMEOUT_MS", MAX_ENV_DURATION) {
            self.test.timeout = timeout;
        }
        if let Some(cooldown) = parser.get_duration_ms("COOLDOWN_MS", MAX_ENV_DURATION) {
            self.lint.cooldown = cooldown;
            self.test.cooldown = cooldown;
        }

        if parser.has_errors() {
            return Err(ConfigError::Env(parser.take_errors()));
        }
        Ok(())
    }

    pub fn check(&self, check: CheckType) -> &CheckConfig {
        match check {
            CheckType::Lint => &self.lint,
            CheckType::Test => &self.test,
        }
    }

    pub fn socket_path(&self, paths: &Paths) -> PathBuf {
        self.general
            .socket_path
            .clone()
            .unwrap_or_else(|| paths.socket())
    }
}

/// Durations as humantime strings such as `"250ms"` or `"1m 30s"`.
mod humantime_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let value = String::deserialize(deserializer)?;
        humantime::parse_duration(&value).map_err(serde::de::Error::custom)
    }
}
