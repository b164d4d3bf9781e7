//! Cross-process lock coordination with cooldown and stale-lock recovery.
//!
//! Each [`LockKey`] maps to a small JSON [`LockRecord`] on disk. Every
//! acquire and release is a read-check-write performed under an exclusive
//! advisory lock on a sidecar file, so concurrent callers on the same key
//! (threads of the daemon, or a daemon and a fallback client in another
//! process) serialize and exactly one of them observes
//! [`LockStatus::Acquired`].
//!
//! A held record whose holder PID is no longer alive is stale and is
//! reclaimed unconditionally, so a crashed daemon never leaves a stuck lock.
//! A record that cannot be parsed is treated the same way.

use crate::clock::Clock;
use crate::errors::StoreError;
use crate::fsutil::{atomic_write, with_exclusive_lock};
use crate::liveness::ProcessLivenessChecker;
use crate::types::{LockKey, LockRecord};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of an acquire attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    /// The caller now holds the lock and must release it.
    Acquired,
    /// A live holder exists (or the store could not be read safely).
    Busy,
    /// No holder, but the previous release is within the cooldown window.
    Cooling,
}

impl LockStatus {
    pub fn is_acquired(self) -> bool {
        matches!(self, Self::Acquired)
    }
}

impl std::fmt::Display for LockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Acquired => write!(f, "acquired"),
            Self::Busy => write!(f, "busy"),
            Self::Cooling => write!(f, "cooling"),
        }
    }
}

/// What the store found for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordState {
    Missing,
    Present(LockRecord),
    /// The record exists but could not be decoded.
    Corrupt(String),
}

/// Storage for lock records.
pub trait LockStore: Send + Sync {
    /// Runs `op` on the current record for `key` while holding exclusive
    /// access to it. If `op` returns a record, it is persisted before the
    /// exclusivity is released.
    fn transact(
        &self,
        key: &LockKey,
        op: &mut dyn FnMut(RecordState) -> Option<LockRecord>,
    ) -> Result<(), StoreError>;
}

/// Lock records as JSON files in one directory.
///
/// Layout: `<dir>/<check>-<workspace>.json` for the record and
/// `<dir>/<check>-<workspace>.lock` as the advisory-lock guard.
#[derive(Debug, Clone)]
pub struct FileLockStore {
    dir: PathBuf,
}

impl FileLockStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, key: &LockKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.file_stem()))
    }

    fn guard_path(&self, key: &LockKey) -> PathBuf {
        self.dir.join(format!("{}.lock", key.file_stem()))
    }
}

fn read_record(path: &Path) -> Result<RecordState, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RecordState::Missing),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    if content.trim().is_empty() {
        return Ok(RecordState::Corrupt("empty record".to_string()));
    }
    Ok(match serde_json::from_str::<LockRecord>(&content) {
        Ok(record) => RecordState::Present(record),
        Err(e) => RecordState::Corrupt(e.to_string()),
    })
}

impl LockStore for FileLockStore {
    fn transact(
        &self,
        key: &LockKey,
        op: &mut dyn FnMut(RecordState) -> Option<LockRecord>,
    ) -> Result<(), StoreError> {
        let record_path = self.record_path(key);
        let guard_path = self.guard_path(key);

        with_exclusive_lock(&guard_path, || -> Result<(), StoreError> {
            let state = read_record(&record_path)?;
            if let Some(updated) = op(state) {
                let json = serde_json::to_vec_pretty(&updated).map_err(StoreError::Encode)?;
                atomic_write(&record_path, &json).map_err(|e| StoreError::io(&record_path, e))?;
            }
            Ok(())
        })
        .map_err(|e| StoreError::io(&guard_path, e))?
    }
}

enum Decision {
    Grant,
    Busy,
    Cooling,
}

/// Cross-process mutual exclusion with cooldown.
#[derive(Clone)]
pub struct LockCoordinator {
    store: Arc<dyn LockStore>,
    clock: Arc<dyn Clock>,
    liveness: Arc<dyn ProcessLivenessChecker>,
    stale_after: Option<Duration>,
}

impl LockCoordinator {
    pub fn new(
        store: Arc<dyn LockStore>,
        clock: Arc<dyn Clock>,
        liveness: Arc<dyn ProcessLivenessChecker>,
    ) -> Self {
        Self {
            store,
            clock,
            liveness,
            stale_after: None,
        }
    }

    /// Treat a holder that has held the lock longer than `max_hold` as stale
    /// even if its PID is alive. Guards against PID reuse.
    pub fn with_stale_after(mut self, max_hold: Duration) -> Self {
        self.stale_after = Some(max_hold);
        self
    }

    /// Try to take the lock for `key` on behalf of `holder_pid`.
    ///
    /// Storage failures are reported as [`LockStatus::Busy`]: the coordinator
    /// never grants a lock it could not record.
    pub fn acquire(&self, key: &LockKey, holder_pid: u32, cooldown: Duration) -> LockStatus {
        let now = self.clock.now();
        let mut status = LockStatus::Busy;

        let result = self.store.transact(key, &mut |state| {
            let record = match state {
                RecordState::Missing => LockRecord::default(),
                RecordState::Present(record) => record,
                RecordState::Corrupt(reason) => {
                    warn!(%key, %reason, "Unparseable lock record, reclaiming as stale");
                    LockRecord::default()
                }
            };

            match self.decide(key, &record, now, cooldown) {
                Decision::Busy => {
                    status = LockStatus::Busy;
                    None
                }
                Decision::Cooling => {
                    status = LockStatus::Cooling;
                    None
                }
                Decision::Grant => {
                    status = LockStatus::Acquired;
                    Some(LockRecord {
                        holder_pid,
                        acquired_at: Some(now),
                        released_at: record.released_at,
                    })
                }
            }
        });

        match result {
            Ok(()) => {
                debug!(%key, holder_pid, %status, "Lock acquire");
                status
            }
            Err(e) => {
                warn!(%key, "Lock store error, treating as busy: {}", e);
                LockStatus::Busy
            }
        }
    }

    /// Mark `key` released now. Safe to call when the lock is not held.
    pub fn release(&self, key: &LockKey) {
        let now = self.clock.now();
        let result = self.store.transact(key, &mut |state| {
            let acquired_at = match state {
                RecordState::Present(record) => record.acquired_at,
                RecordState::Missing | RecordState::Corrupt(_) => None,
            };
            Some(LockRecord {
                holder_pid: 0,
                acquired_at,
                released_at: Some(now),
            })
        });

        match result {
            Ok(()) => debug!(%key, "Lock released"),
            Err(e) => warn!(%key, "Failed to release lock: {}", e),
        }
    }

    fn decide(
        &self,
        key: &LockKey,
        record: &LockRecord,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Decision {
        if record.is_held() {
            if !self.liveness.is_alive(record.holder_pid) {
                debug!(%key, pid = record.holder_pid, "Holder is gone, reclaiming stale lock");
                return Decision::Grant;
            }
            if let (Some(max_hold), Some(acquired_at)) = (self.stale_after, record.acquired_at)
                && elapsed(now, acquired_at) > max_hold
            {
                warn!(
                    %key,
                    pid = record.holder_pid,
                    "Holder exceeded maximum hold time, reclaiming"
                );
                return Decision::Grant;
            }
            return Decision::Busy;
        }

        if let Some(released_at) = record.released_at
            && elapsed(now, released_at) < cooldown
        {
            return Decision::Cooling;
        }

        Decision::Grant
    }
}

/// Time since `since`. A timestamp in the future counts as zero elapsed.
fn elapsed(now: DateTime<Utc>, since: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}
