//! Structured test logging.
//!
//! Tests call [`init_test_logging`] (safe to call repeatedly) or create a
//! guard with [`test_guard!`](crate::test_guard) which also logs the test's
//! start, phases and result with elapsed time.
//!
//! # Environment Variables
//!
//! - `LINTGATE_TEST_LOGGING=1`: enable guard logging (default: on in CI, off locally)
//! - `LINTGATE_TEST_LOG_LEVEL`: filter level (default: `debug`)

use std::sync::Once;
use std::time::Instant;
use tracing::{error, info};

static LOGGING_INIT: Once = Once::new();

/// Install a test-writer subscriber so log lines are captured per test.
pub fn init_test_logging() {
    LOGGING_INIT.call_once(|| {
        let level = std::env::var("LINTGATE_TEST_LOG_LEVEL").unwrap_or_else(|_| "debug".to_string());
        let filter = tracing_subscriber::EnvFilter::try_new(format!(
            "lintgate={level},lintgated={level},lintgate_common={level}"
        ))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .compact()
            .try_init();
    });
}

/// Test execution phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPhase {
    Setup,
    Execute,
    Verify,
    Teardown,
}

impl std::fmt::Display for TestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Setup => write!(f, "setup"),
            Self::Execute => write!(f, "execute"),
            Self::Verify => write!(f, "verify"),
            Self::Teardown => write!(f, "teardown"),
        }
    }
}

struct Active {
    name: String,
    started: Instant,
}

/// Logs TEST START on creation and TEST PASS / TEST FAIL on drop.
///
/// A no-op unless test logging is enabled.
pub struct TestGuard {
    inner: Option<Active>,
}

impl TestGuard {
    pub fn new(test_name: &str) -> Self {
        if !Self::is_enabled() {
            return Self { inner: None };
        }
        init_test_logging();
        info!(test = test_name, "TEST START");
        Self {
            inner: Some(Active {
                name: test_name.to_string(),
                started: Instant::now(),
            }),
        }
    }

    fn is_enabled() -> bool {
        match std::env::var("LINTGATE_TEST_LOGGING").as_deref() {
            Ok("1" | "true") => true,
            Ok("0" | "false") => false,
            _ => std::env::var("CI").is_ok(),
        }
    }

    pub fn log(&self, phase: TestPhase, message: impl AsRef<str>) {
        if let Some(active) = &self.inner {
            info!(
                test = %active.name,
                %phase,
                elapsed_ms = active.started.elapsed().as_millis() as u64,
                "{}",
                message.as_ref()
            );
        }
    }
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        if let Some(active) = self.inner.take() {
            let elapsed_ms = active.started.elapsed().as_millis() as u64;
            if std::thread::panicking() {
                error!(test = %active.name, elapsed_ms, "TEST FAIL");
            } else {
                info!(test = %active.name, elapsed_ms, "TEST PASS");
            }
        }
    }
}

/// Create a [`TestGuard`] named after the enclosing function.
#[macro_export]
macro_rules! test_guard {
    () => {{
        fn _f() {}
        fn _type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        let name = _type_name_of(_f);
        let name = name.strip_suffix("::_f").unwrap_or(name);
        let name = name.rsplit("::").next().unwrap_or(name);
        $crate::testing::TestGuard::new(name)
    }};
}
