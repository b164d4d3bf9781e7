//! lintgate daemon.
//!
//! Owns one lock coordinator, skip registry and runner, and serves hook
//! requests from the `lintgate` CLI over a Unix socket so each hook
//! invocation skips process startup and store loading.

#![forbid(unsafe_code)]

mod api;
mod socket;

use anyhow::{Context, Result};
use clap::Parser;
use lintgate_common::logging::{self, LogOptions};
use lintgate_common::{HookConfig, HookService, Paths, ProcessRunner, ServiceMode};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "lintgated")]
#[command(author, version, about = "lintgate daemon - coordinates lint/test hook runs")]
struct Cli {
    /// Path to Unix socket
    #[arg(short, long, env = "LINTGATE_SOCKET")]
    socket: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Also write logs to a daily-rolling file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = logging::init(&LogOptions {
        default_level: "info",
        verbose: cli.verbose,
        log_dir: cli.log_dir.clone(),
        file_prefix: "lintgated.log",
    })?;

    info!("Starting lintgate daemon...");

    let paths = Paths::resolve();
    let config = HookConfig::load(&paths).context("Failed to load configuration")?;
    let socket_path = cli.socket.unwrap_or_else(|| config.socket_path(&paths));

    // Installed before bind; SIGTERM must never take the default action
    // once the socket exists.
    let terminate = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    let listener = socket::bind(&socket_path, config.general.connect_timeout).await?;
    info!("Listening on {:?}", socket_path);
    info!(
        lock_dir = %paths.lock_dir().display(),
        skip_registry = %paths.skip_registry().display(),
        "Using state"
    );

    let service = Arc::new(HookService::open(
        ServiceMode::Daemon,
        config,
        &paths,
        ProcessRunner,
    ));

    let shutdown = async {
        shutdown_signal(terminate).await;
        socket::remove(&socket_path);
    };
    api::serve(listener, service, shutdown).await;

    info!("lintgate daemon stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal(mut terminate: Signal) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for SIGINT: {}", e);
                std::future::pending::<()>().await;
            }
        }
        _ = terminate.recv() => {}
    }
    info!("Shutdown requested, no longer accepting connections");
}
