//! Process liveness probing for stale-lock detection.

/// Answers "is this PID a running process?".
pub trait ProcessLivenessChecker: Send + Sync {
    fn is_alive(&self, pid: u32) -> bool;
}

/// Probes the operating system.
///
/// Linux reads `/proc`; other Unix systems fall back to `kill -0`. PID 0 is
/// never considered alive since it marks an unheld lock.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsLiveness;

impl ProcessLivenessChecker for OsLiveness {
    fn is_alive(&self, pid: u32) -> bool {
        is_process_alive(pid)
    }
}

pub(crate) fn is_process_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }

    if cfg!(target_os = "linux") {
        return std::path::Path::new(&format!("/proc/{}", pid)).exists();
    }

    std::process::Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
