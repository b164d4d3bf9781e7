//! Execution of discovered validation commands.
//!
//! The child runs in its own process group. The outcome is decided by the
//! direct child alone; once it exits or the deadline passes the whole group
//! is killed, so build tools that fork compilers or test binaries never
//! outlive the hook.

use crate::types::{CommandSpec, Outcome};
use std::collections::BTreeMap;
use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Bytes of captured output kept for debug logging.
const OUTPUT_TAIL_BYTES: usize = 2048;

/// How long to wait for output pipes to close once the command is done.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Runs a [`CommandSpec`] to completion or deadline.
pub trait CommandRunner: Send + Sync {
    /// Run `spec`. A non-empty `env` replaces the child's environment
    /// entirely; an empty one inherits the runner's.
    fn run(
        &self,
        spec: &CommandSpec,
        env: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> impl Future<Output = Outcome> + Send;
}

impl<R: CommandRunner> CommandRunner for Arc<R> {
    fn run(
        &self,
        spec: &CommandSpec,
        env: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> impl Future<Output = Outcome> + Send {
        (**self).run(spec, env, timeout)
    }
}

/// Spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        env: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Outcome {
        let Some((program, args)) = spec.args.split_first() else {
            warn!(check = %spec.check, "Empty command, reporting failure");
            return Outcome::fail(spec, Duration::ZERO);
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if !env.is_empty() {
            cmd.env_clear().envs(env);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        let start = Instant::now();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(command = %spec.display_command(), "Failed to spawn: {}", e);
                return Outcome::fail(spec, start.elapsed());
            }
        };
        let pid = child.id();
        debug!(check = %spec.check, pid, command = %spec.display_command(), "Spawned");

        // Background descendants may hold the pipes open after the parent
        // exits, so the deadline applies to the parent and output is drained
        // separately.
        let stdout = child.stdout.take().map(|pipe| tokio::spawn(drain_tail(pipe)));
        let stderr = child.stderr.take().map(|pipe| tokio::spawn(drain_tail(pipe)));

        let waited = tokio::time::timeout(timeout, child.wait()).await;
        if let Some(pid) = pid {
            kill_process_group(pid).await;
        }
        let stdout = collect_tail(stdout).await;
        let stderr = collect_tail(stderr).await;

        match waited {
            Ok(Ok(status)) => {
                let duration = start.elapsed();
                log_tail("stdout", &stdout);
                log_tail("stderr", &stderr);
                if status.success() {
                    info!(check = %spec.check, duration_ms = duration.as_millis() as u64, "Passed");
                    Outcome::pass(spec, duration)
                } else {
                    info!(
                        check = %spec.check,
                        exit_code = status.code(),
                        duration_ms = duration.as_millis() as u64,
                        "Failed"
                    );
                    Outcome::fail(spec, duration)
                }
            }
            Ok(Err(e)) => {
                warn!(check = %spec.check, "Failed waiting for command: {}", e);
                Outcome::fail(spec, start.elapsed())
            }
            Err(_) => {
                log_tail("stdout", &stdout);
                log_tail("stderr", &stderr);
                warn!(check = %spec.check, timeout_ms = timeout.as_millis() as u64, "Timed out");
                Outcome::timeout(spec, timeout)
            }
        }
    }
}

/// Read `pipe` to EOF, keeping only the last [`OUTPUT_TAIL_BYTES`].
async fn drain_tail<R: AsyncRead + Unpin>(mut pipe: R) -> Vec<u8> {
    let mut tail = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&chunk[..n]);
                if tail.len() > OUTPUT_TAIL_BYTES {
                    tail.drain(..tail.len() - OUTPUT_TAIL_BYTES);
                }
            }
        }
    }
    tail
}

/// Output gathered by a drain task, or nothing if the pipe is still open
/// after [`DRAIN_GRACE`].
async fn collect_tail(task: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    let Some(mut task) = task else {
        return Vec::new();
    };
    match tokio::time::timeout(DRAIN_GRACE, &mut task).await {
        Ok(Ok(tail)) => tail,
        Ok(Err(e)) => {
            debug!("Output drain task failed: {}", e);
            Vec::new()
        }
        Err(_) => {
            task.abort();
            Vec::new()
        }
    }
}

fn log_tail(stream: &str, bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }
    debug!(stream, "{}", String::from_utf8_lossy(bytes).trim_end());
}

#[cfg(unix)]
async fn kill_process_group(pgid: u32) {
    if pgid == 0 {
        return;
    }
    match Command::new("kill")
        .arg("-KILL")
        .arg("--")
        .arg(format!("-{pgid}"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        Ok(status) if status.success() => debug!(pgid, "Killed process group"),
        Ok(_) => debug!(pgid, "Process group already gone"),
        Err(e) => warn!(pgid, "Failed to spawn kill: {}", e),
    }
}

#[cfg(not(unix))]
async fn kill_process_group(_pgid: u32) {}
