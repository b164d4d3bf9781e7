use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// A `lintgated` child process with its own `LINTGATE_HOME`.
pub struct DaemonProcess {
    pub home: TempDir,
    pub socket: PathBuf,
    child: Child,
}

impl DaemonProcess {
    pub fn start() -> Self {
        crate::test_log!("FIXTURE: Starting lintgated");

        let home = TempDir::new().expect("Failed to create temp dir");
        let socket = home.path().join("run").join("lintgated.sock");
        let child = Command::new(env!("CARGO_BIN_EXE_lintgated"))
            .env("LINTGATE_HOME", home.path())
            .env_remove("LINTGATE_SOCKET")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to start lintgated");

        let daemon = Self {
            home,
            socket,
            child,
        };
        assert!(
            wait_for(Duration::from_secs(10), || daemon.socket.exists()),
            "lintgated never created {}",
            daemon.socket.display()
        );
        daemon
    }

    pub fn home(&self) -> &Path {
        self.home.path()
    }

    /// Send SIGTERM and wait for the process to exit.
    pub fn terminate(mut self) -> ExitStatus {
        let status = Command::new("kill")
            .args(["-TERM", &self.child.id().to_string()])
            .status()
            .expect("Failed to run kill");
        assert!(status.success());

        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(status) = self.child.try_wait().expect("Failed to poll lintgated") {
                return status;
            }
            assert!(Instant::now() < deadline, "lintgated did not exit on SIGTERM");
            thread::sleep(Duration::from_millis(20));
        }
    }
}

impl Drop for DaemonProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn wait_for(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    condition()
}
