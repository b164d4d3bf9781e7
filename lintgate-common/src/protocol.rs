//! Wire protocol between the hook CLI and the daemon, and the hook payload
//! read from stdin.
//!
//! One connection carries exactly one [`Request`] followed by one
//! [`Response`], each a single line of JSON. Requests carry the caller's
//! whole environment and are capped at [`MAX_REQUEST_BYTES`]; responses at
//! [`MAX_RESPONSE_BYTES`].

use crate::errors::{ParamsError, TransportError};
use crate::types::SkipType;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Nothing to report: contention, cooldown, skipped, or no command.
pub const EXIT_SILENT: i32 = 0;
/// A validation ran; its message is on stdout.
pub const EXIT_BLOCKING: i32 = 2;
/// Not contention and not a validation result: bad params, corrupted state.
pub const EXIT_INTERNAL: i32 = 1;

/// Largest request accepted on the socket.
pub const MAX_REQUEST_BYTES: usize = 8 * 1024 * 1024;
/// Largest response accepted on the socket.
pub const MAX_RESPONSE_BYTES: usize = 64 * 1024;

/// Method names understood by the daemon and the fallback.
pub mod method {
    use crate::types::CheckType;

    pub const LINT: &str = "lint";
    pub const TEST: &str = "test";
    pub const STATS: &str = "stats";
    pub const SKIP_ADD: &str = "skip_add";
    pub const SKIP_REMOVE: &str = "skip_remove";
    pub const SKIP_LIST: &str = "skip_list";
    pub const SKIP_CLEAR: &str = "skip_clear";
    pub const PING: &str = "ping";

    /// The check a method runs, if it runs one.
    pub fn check_for(method: &str) -> Option<CheckType> {
        match method {
            LINT => Some(CheckType::Lint),
            TEST => Some(CheckType::Test),
            _ => None,
        }
    }

    pub fn for_check(check: CheckType) -> &'static str {
        match check {
            CheckType::Lint => LINT,
            CheckType::Test => TEST,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    /// Opaque to the transport; JSON for the built-in methods.
    #[serde(default)]
    pub params: String,
}

impl Request {
    pub fn new(method: impl Into<String>, params: &impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self {
            method: method.into(),
            params: serde_json::to_string(params)?,
        })
    }

    /// A request without params.
    pub fn bare(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: String::new(),
        }
    }

    pub fn parse_params<T: DeserializeOwned>(&self) -> Result<T, ParamsError> {
        serde_json::from_str(&self.params).map_err(ParamsError::Invalid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub result: String,
    pub exit_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Exit 0, nothing printed.
    pub fn silent() -> Self {
        Self {
            result: String::new(),
            exit_code: EXIT_SILENT,
            error: None,
        }
    }

    /// Exit 0 with output, for informational methods.
    pub fn ok(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            exit_code: EXIT_SILENT,
            error: None,
        }
    }

    /// Exit 2 with a message for the agent.
    pub fn blocking(message: impl Into<String>) -> Self {
        Self {
            result: message.into(),
            exit_code: EXIT_BLOCKING,
            error: None,
        }
    }

    /// Exit 1 with an operator-facing error.
    pub fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            result: String::new(),
            exit_code: EXIT_INTERNAL,
            error: Some(error.to_string()),
        }
    }
}

/// Params of `lint` and `test`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookParams {
    /// Directory discovery starts from. Must be absolute.
    pub dir: PathBuf,
    /// The caller's environment. Empty means inherit the executor's.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_ms: Option<u64>,
}

impl HookParams {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.dir.is_absolute() {
            Ok(())
        } else {
            Err(ParamsError::RelativeDir(self.dir.clone()))
        }
    }
}

/// Params of `skip_add`, `skip_remove` and `skip_clear`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipParams {
    pub dir: PathBuf,
    #[serde(default)]
    pub types: Vec<SkipType>,
}

impl SkipParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.dir.is_absolute() {
            Ok(())
        } else {
            Err(ParamsError::RelativeDir(self.dir.clone()))
        }
    }
}

/// Post-edit hook payload delivered on stdin.
///
/// Only the fields needed to locate the project are read; everything else
/// is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<ToolInput>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolInput {
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

impl HookInput {
    /// Directory of the edited file, else the session's working directory.
    pub fn start_dir(&self) -> Option<PathBuf> {
        let file_path = self.tool_input.as_ref().and_then(|t| t.file_path.as_deref());
        if let Some(file_path) = file_path {
            let absolute = match &self.cwd {
                Some(cwd) if file_path.is_relative() => cwd.join(file_path),
                _ => file_path.to_path_buf(),
            };
            if let Some(parent) = absolute.parent().filter(|p| !p.as_os_str().is_empty()) {
                return Some(parent.to_path_buf());
            }
        }
        self.cwd.clone()
    }
}

/// Read one newline-terminated JSON message of at most `limit` bytes.
pub async fn read_frame<T, R>(reader: R, limit: usize) -> Result<T, TransportError>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader).take(limit as u64 + 1);
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Err(TransportError::Closed);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    } else if buf.len() > limit {
        return Err(TransportError::FrameTooLarge { limit });
    }
    serde_json::from_slice(&buf).map_err(TransportError::Malformed)
}

/// Write one message followed by a newline, refusing more than `limit`
/// bytes.
pub async fn write_frame<T, W>(writer: &mut W, message: &T, limit: usize) -> Result<(), TransportError>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let mut buf = serde_json::to_vec(message).map_err(TransportError::Malformed)?;
    if buf.len() > limit {
        return Err(TransportError::FrameTooLarge { limit });
    }
    buf.push(b'\n');
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}
