//! Shared coordination layer for lintgate.
//!
//! Everything the hook CLI and the daemon have in common lives here: the
//! cross-process [`LockCoordinator`], the [`SkipRegistry`], the
//! [`ProcessRunner`], the wire protocol, and [`HookService`], which is the one
//! handler both the daemon and the in-process fallback execute.

pub mod client;
pub mod clock;
pub mod config;
pub mod discovery;
pub mod errors;
mod fsutil;
pub mod liveness;
pub mod lock;
pub mod logging;
pub mod paths;
pub mod protocol;
pub mod runner;
pub mod service;
pub mod skip;
pub mod testing;
pub mod types;

pub use client::{CallOutcome, CallPath, Client, Transport, UnixTransport};
pub use clock::{Clock, SystemClock};
pub use config::{CheckConfig, EnvParser, GeneralConfig, HookConfig};
pub use discovery::{Discoverer, ProjectDiscoverer};
pub use errors::{ConfigError, ParamsError, RegistryError, StoreError, TransportError};
pub use liveness::{OsLiveness, ProcessLivenessChecker};
pub use lock::{FileLockStore, LockCoordinator, LockStatus, LockStore, RecordState};
pub use paths::Paths;
pub use protocol::{
    EXIT_BLOCKING, EXIT_INTERNAL, EXIT_SILENT, HookInput, HookParams, MAX_REQUEST_BYTES, MAX_RESPONSE_BYTES, Request,
    Response, SkipParams, method, read_frame, write_frame,
};
pub use runner::{CommandRunner, ProcessRunner};
pub use service::{HookService, ServiceMode, StatsSnapshot};
pub use skip::{JsonFileRegistryStore, RegistryStore, SkipMap, SkipRegistry};
pub use types::{
    CheckType, CommandSpec, LockKey, LockRecord, Outcome, OutcomeStatus, SkipEntry, SkipType,
    workspace_id,
};
