//! Common types used across lintgate components.

use crate::errors::ParamsError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Kind of validation a hook triggers.
///
/// Lint and test runs are coordinated independently: they never share a
/// lock key and can be skipped separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    Lint,
    Test,
}

/// Skip flags use the same vocabulary as checks.
pub type SkipType = CheckType;

impl CheckType {
    pub const ALL: [CheckType; 2] = [CheckType::Lint, CheckType::Test];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lint => "lint",
            Self::Test => "test",
        }
    }

    /// Capitalized noun used in user-facing messages.
    pub fn noun(self) -> &'static str {
        match self {
            Self::Lint => "Lint",
            Self::Test => "Test",
        }
    }

    /// Message emitted when the validation command passes.
    pub fn success_message(self) -> &'static str {
        match self {
            Self::Lint => "Lints pass. Continue with your task.",
            Self::Test => "Tests pass. Continue with your task.",
        }
    }
}

impl std::fmt::Display for CheckType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckType {
    type Err = ParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lint" => Ok(Self::Lint),
            "test" => Ok(Self::Test),
            other => Err(ParamsError::UnknownCheck(other.to_string())),
        }
    }
}

/// Stable identifier for a project root.
///
/// First 16 hex characters of the BLAKE3 hash of the root path.
pub fn workspace_id(root: &Path) -> String {
    let hash = blake3::hash(root.as_os_str().as_encoded_bytes());
    hash.to_hex()[..16].to_string()
}

/// Identifies one lock: a check type scoped to one workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey {
    pub check: CheckType,
    pub workspace: String,
}

impl LockKey {
    pub fn new(check: CheckType, workspace: impl Into<String>) -> Self {
        Self {
            check,
            workspace: workspace.into(),
        }
    }

    /// Key for `check` in the project rooted at `root`.
    pub fn for_root(check: CheckType, root: &Path) -> Self {
        Self::new(check, workspace_id(root))
    }

    /// File stem of the persisted record, e.g. `lint-0123456789abcdef`.
    pub fn file_stem(&self) -> String {
        format!("{}-{}", self.check, self.workspace)
    }
}

impl std::fmt::Display for LockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.check, self.workspace)
    }
}

/// Persisted state of one lock key.
///
/// `holder_pid == 0` means the key is not currently held. Records are
/// overwritten in place and never deleted so the cooldown history survives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub holder_pid: u32,
    #[serde(default)]
    pub acquired_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub released_at: Option<DateTime<Utc>>,
}

impl LockRecord {
    pub fn is_held(&self) -> bool {
        self.holder_pid != 0
    }
}

/// A concrete validation command produced by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub check: CheckType,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl CommandSpec {
    pub fn new(check: CheckType, args: Vec<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            check,
            args,
            working_dir: working_dir.into(),
        }
    }

    /// The command line, shell-quoted.
    pub fn display_command(&self) -> String {
        self.args
            .iter()
            .map(|arg| shell_escape::escape(arg.as_str().into()).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Command a user can paste into a shell to reproduce the run.
    pub fn repro_command(&self) -> String {
        let dir = self.working_dir.to_string_lossy();
        format!(
            "cd {} && {}",
            shell_escape::escape(dir),
            self.display_command()
        )
    }
}

/// How a validation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Pass,
    Fail,
    Timeout,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Fail => write!(f, "fail"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// Result of one validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status: OutcomeStatus,
    /// Short message shown to the agent.
    pub message: String,
    pub repro_command: String,
    pub duration: Duration,
}

impl Outcome {
    pub fn pass(spec: &CommandSpec, duration: Duration) -> Self {
        Self {
            status: OutcomeStatus::Pass,
            message: spec.check.success_message().to_string(),
            repro_command: spec.repro_command(),
            duration,
        }
    }

    pub fn fail(spec: &CommandSpec, duration: Duration) -> Self {
        let repro_command = spec.repro_command();
        Self {
            status: OutcomeStatus::Fail,
            message: format!(
                "BLOCKING: Run {} to fix {} failures",
                delimit(&repro_command),
                spec.check
            ),
            repro_command,
            duration,
        }
    }

    pub fn timeout(spec: &CommandSpec, limit: Duration) -> Self {
        let repro_command = spec.repro_command();
        Self {
            status: OutcomeStatus::Timeout,
            message: format!(
                "BLOCKING: {} timed out after {}. Run {} to investigate",
                spec.check.noun(),
                humantime::format_duration(limit),
                delimit(&repro_command)
            ),
            repro_command,
            duration: limit,
        }
    }
}

/// Set a command off from the surrounding message. Single quotes unless the
/// command itself contains one, then backticks, so the text between the
/// delimiters can be pasted as-is.
fn delimit(command: &str) -> String {
    if command.contains('\'') {
        format!("`{command}`")
    } else {
        format!("'{command}'")
    }
}

/// One directory's opt-out flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipEntry {
    pub path: String,
    pub types: BTreeSet<SkipType>,
}
