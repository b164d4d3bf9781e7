//! The request handler shared by the daemon and the in-process fallback.
//!
//! A `lint`/`test` request goes through: skip check, discovery, lock
//! acquire, run, release. Contention and cooldown are silent successes;
//! a completed run always produces a message with exit code 2.

use crate::clock::SystemClock;
use crate::config::{HookConfig, max_hold};
use crate::discovery::{Discoverer, ProjectDiscoverer};
use crate::errors::ParamsError;
use crate::liveness::OsLiveness;
use crate::lock::{FileLockStore, LockCoordinator, LockStatus};
use crate::paths::Paths;
use crate::protocol::{HookParams, Request, Response, SkipParams, method};
use crate::runner::CommandRunner;
use crate::skip::{JsonFileRegistryStore, SkipRegistry};
use crate::types::{CheckType, LockKey, OutcomeStatus, SkipEntry};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where a service instance runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMode {
    Daemon,
    Local,
}

/// Counters reported by the `stats` method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub mode: ServiceMode,
    pub pid: u32,
    pub uptime_secs: u64,
    pub requests: u64,
    pub passed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub busy: u64,
    pub cooling: u64,
    pub skipped: u64,
}

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    passed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    busy: AtomicU64,
    cooling: AtomicU64,
    skipped: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Run blocking store I/O (flock, file reads and writes) off the async
/// workers.
async fn blocking<T, F>(op: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| format!("store task failed: {e}"))
}

/// A granted lock. [`HeldLock::release`] releases it on the blocking pool;
/// dropping it unreleased (the request future was cancelled mid-run)
/// releases it inline.
struct HeldLock {
    locks: LockCoordinator,
    key: Option<LockKey>,
}

impl HeldLock {
    async fn release(mut self) {
        let Some(key) = self.key.take() else {
            return;
        };
        let locks = self.locks.clone();
        if let Err(e) = blocking(move || locks.release(&key)).await {
            warn!("Lock release failed: {}", e);
        }
    }
}

impl Drop for HeldLock {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.locks.release(&key);
        }
    }
}

enum SkipOp {
    Add,
    Remove,
    Clear,
}

pub struct HookService<R> {
    mode: ServiceMode,
    config: HookConfig,
    locks: LockCoordinator,
    skips: Arc<SkipRegistry>,
    runner: R,
    discoverer: Arc<dyn Discoverer>,
    holder_pid: u32,
    started: Instant,
    counters: Counters,
}

impl<R: CommandRunner> HookService<R> {
    pub fn new(
        mode: ServiceMode,
        config: HookConfig,
        locks: LockCoordinator,
        skips: SkipRegistry,
        runner: R,
        discoverer: Arc<dyn Discoverer>,
    ) -> Self {
        Self {
            mode,
            config,
            locks,
            skips: Arc::new(skips),
            runner,
            discoverer,
            holder_pid: std::process::id(),
            started: Instant::now(),
            counters: Counters::default(),
        }
    }

    /// A service over the on-disk stores under `paths`.
    pub fn open(mode: ServiceMode, config: HookConfig, paths: &Paths, runner: R) -> Self {
        let locks = LockCoordinator::new(
            Arc::new(FileLockStore::new(paths.lock_dir())),
            Arc::new(SystemClock),
            Arc::new(OsLiveness),
        );
        let skips = SkipRegistry::new(Arc::new(JsonFileRegistryStore::new(paths.skip_registry())));
        Self::new(mode, config, locks, skips, runner, Arc::new(ProjectDiscoverer))
    }

    pub fn mode(&self) -> ServiceMode {
        self.mode
    }

    pub fn config(&self) -> &HookConfig {
        &self.config
    }

    /// Handle one request. Never fails: every error becomes a response.
    pub async fn handle(&self, request: &Request) -> Response {
        bump(&self.counters.requests);
        debug!(method = %request.method, mode = ?self.mode, "Handling request");

        if let Some(check) = method::check_for(&request.method) {
            return match request.parse_params::<HookParams>() {
                Ok(params) => self.run_check(check, params).await,
                Err(e) => Response::internal(e),
            };
        }

        match request.method.as_str() {
            method::STATS => match serde_json::to_string(&self.stats()) {
                Ok(json) => Response::ok(json),
                Err(e) => Response::internal(e),
            },
            method::PING => Response::ok("pong"),
            method::SKIP_ADD => self.update_skips(request, SkipOp::Add).await,
            method::SKIP_REMOVE => self.update_skips(request, SkipOp::Remove).await,
            method::SKIP_CLEAR => self.update_skips(request, SkipOp::Clear).await,
            method::SKIP_LIST => self.list_skips().await,
            other => Response::internal(ParamsError::UnknownMethod(other.to_string())),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            mode: self.mode,
            pid: self.holder_pid,
            uptime_secs: self.started.elapsed().as_secs(),
            requests: load(&self.counters.requests),
            passed: load(&self.counters.passed),
            failed: load(&self.counters.failed),
            timed_out: load(&self.counters.timed_out),
            busy: load(&self.counters.busy),
            cooling: load(&self.counters.cooling),
            skipped: load(&self.counters.skipped),
        }
    }

    async fn run_check(&self, check: CheckType, params: HookParams) -> Response {
        if let Err(e) = params.validate() {
            return Response::internal(e);
        }

        match self.is_skipped(params.dir.clone(), check).await {
            Ok(true) => {
                debug!(%check, dir = %params.dir.display(), "Skipped for directory");
                bump(&self.counters.skipped);
                return Response::silent();
            }
            Ok(false) => {}
            Err(e) => return Response::internal(e),
        }

        let Some(spec) = self.discoverer.discover(check, &params.dir) else {
            debug!(%check, dir = %params.dir.display(), "No command discovered");
            return Response::silent();
        };

        if spec.working_dir != params.dir {
            match self.is_skipped(spec.working_dir.clone(), check).await {
                Ok(true) => {
                    debug!(%check, root = %spec.working_dir.display(), "Skipped for project root");
                    bump(&self.counters.skipped);
                    return Response::silent();
                }
                Ok(false) => {}
                Err(e) => return Response::internal(e),
            }
        }

        let settings = self.config.check(check);
        let timeout = params
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(settings.timeout);
        let cooldown = params
            .cooldown_ms
            .map(Duration::from_millis)
            .unwrap_or(settings.cooldown);

        let key = LockKey::for_root(check, &spec.working_dir);
        let locks = self.locks.clone().with_stale_after(max_hold(timeout));
        let status = {
            let (locks, key, holder_pid) = (locks.clone(), key.clone(), self.holder_pid);
            blocking(move || locks.acquire(&key, holder_pid, cooldown)).await
        };
        match status {
            Err(e) => return Response::internal(e),
            Ok(LockStatus::Acquired) => {}
            Ok(LockStatus::Busy) => {
                debug!(%key, "Another run in progress");
                bump(&self.counters.busy);
                return Response::silent();
            }
            Ok(LockStatus::Cooling) => {
                debug!(%key, "Within cooldown");
                bump(&self.counters.cooling);
                return Response::silent();
            }
        }

        let held = HeldLock {
            locks,
            key: Some(key),
        };
        info!(%check, root = %spec.working_dir.display(), "Running {}", spec.display_command());
        let outcome = self.runner.run(&spec, &params.env, timeout).await;
        held.release().await;

        match outcome.status {
            OutcomeStatus::Pass => bump(&self.counters.passed),
            OutcomeStatus::Fail => bump(&self.counters.failed),
            OutcomeStatus::Timeout => bump(&self.counters.timed_out),
        }
        Response::blocking(outcome.message)
    }

    async fn is_skipped(&self, dir: PathBuf, check: CheckType) -> Result<bool, String> {
        let skips = self.skips.clone();
        blocking(move || skips.is_skipped(&dir, check))
            .await?
            .map_err(|e| e.to_string())
    }

    async fn update_skips(&self, request: &Request, op: SkipOp) -> Response {
        let params = match request.parse_params::<SkipParams>() {
            Ok(params) => params,
            Err(e) => return Response::internal(e),
        };
        if let Err(e) = params.validate() {
            return Response::internal(e);
        }

        let skips = self.skips.clone();
        let result = blocking(move || {
            let dir = params.dir.display();
            let types = || {
                params
                    .types
                    .iter()
                    .map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let updated = match op {
                SkipOp::Add => params
                    .types
                    .iter()
                    .try_for_each(|t| skips.add_skip(&params.dir, *t))
                    .map(|()| format!("Skipping {} in {}", types(), dir)),
                SkipOp::Remove => params
                    .types
                    .iter()
                    .try_for_each(|t| skips.remove_skip(&params.dir, *t))
                    .map(|()| format!("No longer skipping {} in {}", types(), dir)),
                SkipOp::Clear => skips
                    .clear(&params.dir)
                    .map(|()| format!("Cleared skips for {}", dir)),
            };
            updated.map_err(|e| e.to_string())
        })
        .await
        .and_then(|result| result);

        match result {
            Ok(message) => {
                info!("{}", message);
                Response::ok(message)
            }
            Err(e) => {
                warn!("Skip registry update failed: {}", e);
                Response::internal(e)
            }
        }
    }

    async fn list_skips(&self) -> Response {
        let skips = self.skips.clone();
        let entries: Vec<SkipEntry> = match blocking(move || skips.list_all()).await {
            Ok(Ok(entries)) => entries,
            Ok(Err(e)) => return Response::internal(e),
            Err(e) => return Response::internal(e),
        };
        match serde_json::to_string(&entries) {
            Ok(json) => Response::ok(json),
            Err(e) => Response::internal(e),
        }
    }
}
