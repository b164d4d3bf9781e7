//! In-memory fakes for the injected capabilities.

use crate::clock::Clock;
use crate::discovery::Discoverer;
use crate::errors::{RegistryError, StoreError};
use crate::liveness::ProcessLivenessChecker;
use crate::lock::{LockStore, RecordState};
use crate::runner::CommandRunner;
use crate::skip::{RegistryStore, SkipMap};
use crate::types::{CheckType, CommandSpec, LockKey, LockRecord, Outcome, OutcomeStatus};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }

    pub fn rewind(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now -= chrono::Duration::from_std(by).unwrap();
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Liveness answered from a fixed set of PIDs.
#[derive(Default)]
pub struct AliveSet {
    pids: Mutex<HashSet<u32>>,
}

impl AliveSet {
    pub fn new(pids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            pids: Mutex::new(pids.into_iter().collect()),
        }
    }

    pub fn insert(&self, pid: u32) {
        self.pids.lock().unwrap().insert(pid);
    }

    pub fn remove(&self, pid: u32) {
        self.pids.lock().unwrap().remove(&pid);
    }
}

impl ProcessLivenessChecker for AliveSet {
    fn is_alive(&self, pid: u32) -> bool {
        self.pids.lock().unwrap().contains(&pid)
    }
}

#[derive(Clone)]
enum Slot {
    Record(LockRecord),
    Corrupt,
}

/// Lock records held in a map. The map mutex provides the exclusivity the
/// file store gets from its advisory lock.
#[derive(Default)]
pub struct MemoryLockStore {
    records: Mutex<HashMap<LockKey, Slot>>,
}

impl MemoryLockStore {
    pub fn get(&self, key: &LockKey) -> Option<LockRecord> {
        match self.records.lock().unwrap().get(key) {
            Some(Slot::Record(record)) => Some(record.clone()),
            Some(Slot::Corrupt) | None => None,
        }
    }

    pub fn put(&self, key: &LockKey, record: LockRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(key.clone(), Slot::Record(record));
    }

    /// Make the record for `key` undecodable.
    pub fn corrupt(&self, key: &LockKey) {
        self.records.lock().unwrap().insert(key.clone(), Slot::Corrupt);
    }
}

impl LockStore for MemoryLockStore {
    fn transact(
        &self,
        key: &LockKey,
        op: &mut dyn FnMut(RecordState) -> Option<LockRecord>,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap();
        let state = match records.get(key) {
            None => RecordState::Missing,
            Some(Slot::Record(record)) => RecordState::Present(record.clone()),
            Some(Slot::Corrupt) => RecordState::Corrupt("corrupted by test".to_string()),
        };
        if let Some(updated) = op(state) {
            records.insert(key.clone(), Slot::Record(updated));
        }
        Ok(())
    }
}

/// A lock store whose every operation fails.
pub struct FailingLockStore;

impl LockStore for FailingLockStore {
    fn transact(
        &self,
        key: &LockKey,
        _op: &mut dyn FnMut(RecordState) -> Option<LockRecord>,
    ) -> Result<(), StoreError> {
        Err(StoreError::Io {
            path: PathBuf::from(format!("/unavailable/{}.json", key.file_stem())),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "store unavailable"),
        })
    }
}

/// Skip registry held in memory. Counts loads so caching can be observed.
#[derive(Default)]
pub struct MemoryRegistryStore {
    map: Mutex<SkipMap>,
    loads: AtomicUsize,
}

impl MemoryRegistryStore {
    pub fn contents(&self) -> SkipMap {
        self.map.lock().unwrap().clone()
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl RegistryStore for MemoryRegistryStore {
    fn load(&self) -> Result<SkipMap, RegistryError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.contents())
    }

    fn update(&self, mutate: &mut dyn FnMut(&mut SkipMap)) -> Result<SkipMap, RegistryError> {
        let mut map = self.map.lock().unwrap();
        let mut updated = map.clone();
        mutate(&mut updated);
        *map = updated.clone();
        Ok(updated)
    }
}

/// In-memory registry whose writes can be made to fail.
#[derive(Default)]
pub struct FailingRegistryStore {
    inner: MemoryRegistryStore,
    fail: AtomicBool,
}

impl FailingRegistryStore {
    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl RegistryStore for FailingRegistryStore {
    fn load(&self) -> Result<SkipMap, RegistryError> {
        self.inner.load()
    }

    fn update(&self, mutate: &mut dyn FnMut(&mut SkipMap)) -> Result<SkipMap, RegistryError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RegistryError::io(
                "/unavailable/skips.json",
                io::Error::new(io::ErrorKind::StorageFull, "disk full"),
            ));
        }
        self.inner.update(mutate)
    }
}

/// A runner that returns a configured status after an optional delay,
/// without spawning anything.
pub struct ScriptedRunner {
    status: Mutex<OutcomeStatus>,
    delay: Duration,
    calls: AtomicUsize,
    last_env: Mutex<Option<BTreeMap<String, String>>>,
}

impl ScriptedRunner {
    pub fn new(status: OutcomeStatus) -> Self {
        Self {
            status: Mutex::new(status),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            last_env: Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_status(&self, status: OutcomeStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Environment passed to the most recent run.
    pub fn last_env(&self) -> Option<BTreeMap<String, String>> {
        self.last_env.lock().unwrap().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        env: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_env.lock().unwrap() = Some(env.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let status = *self.status.lock().unwrap();
        match status {
            OutcomeStatus::Pass => Outcome::pass(spec, self.delay),
            OutcomeStatus::Fail => Outcome::fail(spec, self.delay),
            OutcomeStatus::Timeout => Outcome::timeout(spec, timeout),
        }
    }
}

/// Discovery with fixed answers: every start directory maps to `root`.
#[derive(Debug, Clone)]
pub struct StaticDiscoverer {
    root: PathBuf,
    commands: BTreeMap<CheckType, Vec<String>>,
}

impl StaticDiscoverer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            commands: BTreeMap::new(),
        }
    }

    pub fn with(mut self, check: CheckType, args: &[&str]) -> Self {
        self.commands
            .insert(check, args.iter().map(|a| a.to_string()).collect());
        self
    }
}

impl Discoverer for StaticDiscoverer {
    fn discover(&self, check: CheckType, _start_dir: &Path) -> Option<CommandSpec> {
        self.commands
            .get(&check)
            .map(|args| CommandSpec::new(check, args.clone(), &self.root))
    }
}
