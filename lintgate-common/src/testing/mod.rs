//! Test support shared by the lintgate crates.
//!
//! Deterministic fakes for every injected capability (clock, liveness, lock
//! and registry storage, command runner, discovery) plus structured test
//! logging.

mod fakes;
mod log;

pub use fakes::{
    AliveSet, FailingLockStore, FailingRegistryStore, ManualClock, MemoryLockStore,
    MemoryRegistryStore, ScriptedRunner, StaticDiscoverer,
};
pub use log::{TestGuard, TestPhase, init_test_logging};
