//! Turning a hook invocation into a request, and a response into output.
//!
//! The agent runtime pipes a JSON payload describing the tool call on
//! stdin. The edited file's directory is where project discovery starts.

use anyhow::{Context, Result};
use lintgate_common::{
    CheckType, HookConfig, HookInput, HookParams, Request, SkipEntry, SkipParams, SkipType,
    method,
};
use std::collections::BTreeMap;
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read the hook payload from stdin, if one is being piped.
pub fn read_stdin_payload() -> Option<String> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return None;
    }
    let mut input = String::new();
    match stdin.read_to_string(&mut input) {
        Ok(_) if !input.trim().is_empty() => Some(input),
        Ok(_) => None,
        Err(e) => {
            debug!("Failed to read hook payload: {}", e);
            None
        }
    }
}

/// Directory discovery starts from.
///
/// An explicit `--dir` wins, then the hook payload, then `cwd`. A payload
/// that does not parse is ignored.
pub fn start_dir(explicit: Option<&Path>, payload: Option<&str>, cwd: &Path) -> PathBuf {
    let dir = explicit
        .map(Path::to_path_buf)
        .or_else(|| {
            payload.and_then(|raw| match serde_json::from_str::<HookInput>(raw) {
                Ok(input) => input.start_dir(),
                Err(e) => {
                    debug!("Ignoring unparseable hook payload: {}", e);
                    None
                }
            })
        })
        .unwrap_or_else(|| cwd.to_path_buf());

    if dir.is_absolute() {
        dir
    } else {
        cwd.join(dir)
    }
}

/// Environment forwarded to the command, restricted to UTF-8 entries.
pub fn caller_env() -> BTreeMap<String, String> {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

/// Build a `lint`/`test` request carrying this process's environment and
/// the configured limits, so the daemon runs the command as we would.
pub fn check_request(
    check: CheckType,
    dir: PathBuf,
    env: BTreeMap<String, String>,
    config: &HookConfig,
) -> Result<Request> {
    let limits = config.check(check);
    let params = HookParams {
        dir,
        env,
        timeout_ms: Some(duration_ms(limits.timeout)),
        cooldown_ms: Some(duration_ms(limits.cooldown)),
    };
    Request::new(method::for_check(check), &params).context("Failed to encode request")
}

pub fn skip_request(method: &str, dir: PathBuf, types: Vec<SkipType>) -> Result<Request> {
    Request::new(method, &SkipParams { dir, types }).context("Failed to encode request")
}

fn duration_ms(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Render a `skip_list` result as one line per directory.
pub fn format_skip_list(result: &str) -> Result<String> {
    let entries: Vec<SkipEntry> =
        serde_json::from_str(result).context("Malformed skip list from daemon")?;
    if entries.is_empty() {
        return Ok("No directories are skipped".to_string());
    }
    let lines: Vec<String> = entries
        .iter()
        .map(|entry| {
            let types: Vec<&str> = entry.types.iter().map(|t| t.as_str()).collect();
            format!("{}: {}", entry.path, types.join(", "))
        })
        .collect();
    Ok(lines.join("\n"))
}
