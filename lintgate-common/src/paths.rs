//! Filesystem locations used by lintgate.
//!
//! | Item | Default |
//! |---|---|
//! | config file | `<config_dir>/lintgate/config.toml` |
//! | skip registry | `<config_dir>/lintgate/skips.json` |
//! | lock records | `<state_dir>/lintgate/locks/` |
//! | socket | `$XDG_RUNTIME_DIR/lintgate/lintgated.sock`, else `<tmp>/lintgate-<user>/lintgated.sock` |
//!
//! Setting `LINTGATE_HOME` places everything under that one directory.

use std::path::{Path, PathBuf};

pub const HOME_ENV: &str = "LINTGATE_HOME";
pub const SOCKET_FILE: &str = "lintgated.sock";

/// Resolved locations for one lintgate installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub config_dir: PathBuf,
    pub state_dir: PathBuf,
    pub runtime_dir: PathBuf,
}

impl Paths {
    /// Resolve from `LINTGATE_HOME` if set, otherwise from the platform
    /// directories.
    pub fn resolve() -> Self {
        match std::env::var_os(HOME_ENV) {
            Some(home) if !home.is_empty() => Self::under(PathBuf::from(home)),
            _ => Self::platform(),
        }
    }

    /// Everything under one root.
    pub fn under(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            config_dir: home.join("config"),
            state_dir: home.join("state"),
            runtime_dir: home.join("run"),
        }
    }

    fn platform() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| std::env::temp_dir().join("lintgate-config"))
            .join("lintgate");
        let state_dir = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(std::env::temp_dir)
            .join("lintgate");
        let runtime_dir = match dirs::runtime_dir() {
            Some(dir) => dir.join("lintgate"),
            None => std::env::temp_dir().join(format!("lintgate-{}", current_user())),
        };
        Self {
            config_dir,
            state_dir,
            runtime_dir,
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn skip_registry(&self) -> PathBuf {
        self.config_dir.join("skips.json")
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.state_dir.join("locks")
    }

    pub fn socket(&self) -> PathBuf {
        self.runtime_dir.join(SOCKET_FILE)
    }
}

#[cfg(unix)]
fn current_user() -> String {
    whoami::username().unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(not(unix))]
fn current_user() -> String {
    "unknown".to_string()
}

/// Canonical string form of a directory, used as a registry key.
///
/// Existing directories are canonicalized (symlinks resolved); others are
/// made absolute lexically.
pub fn normalize_dir(dir: &Path) -> String {
    let normalized = dir
        .canonicalize()
        .or_else(|_| std::path::absolute(dir))
        .unwrap_or_else(|_| dir.to_path_buf());
    normalized.to_string_lossy().into_owned()
}
