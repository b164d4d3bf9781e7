//! Socket file lifecycle.

use anyhow::{Context, Result, bail};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

/// Bind `path`, replacing a stale socket file left by a crashed daemon.
///
/// Fails if another daemon answers on `path`. The socket is made
/// owner-only (0600). A missing parent directory is created owner-only
/// (0700); an existing one is left untouched.
pub async fn bind(path: &Path, connect_timeout: Duration) -> Result<UnixListener> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty() && !p.exists()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create socket directory {}", parent.display()))?;
        if let Err(e) = fs::set_permissions(parent, fs::Permissions::from_mode(0o700)) {
            debug!(dir = %parent.display(), "Could not restrict socket directory: {}", e);
        }
    }

    if path.exists() {
        let live = matches!(
            tokio::time::timeout(connect_timeout, UnixStream::connect(path)).await,
            Ok(Ok(_))
        );
        if live {
            bail!("Another lintgated is already listening on {}", path.display());
        }
        info!(socket = %path.display(), "Removing stale socket");
        fs::remove_file(path)
            .with_context(|| format!("Failed to remove stale socket {}", path.display()))?;
    }

    let listener = UnixListener::bind(path)
        .with_context(|| format!("Failed to bind {}", path.display()))?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    Ok(listener)
}

/// Remove the socket file on shutdown.
pub fn remove(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(socket = %path.display(), "Removed socket"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(socket = %path.display(), "Failed to remove socket: {}", e),
    }
}
