use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Variables that would leak the developer's own setup into a test run.
const SCRUBBED_ENV: &[&str] = &[
    "LINTGATE_SOCKET",
    "LINTGATE_NO_DAEMON",
    "LINTGATE_LINT_TIMEOUT_MS",
    "LINTGATE_TEST_TIMEOUT_MS",
    "LINTGATE_COOLDOWN_MS",
    "LINTGATE_CONNECT_TIMEOUT_MS",
    "LINTGATE_LOG",
];

/// A project with a `.lintgate.toml` and an isolated `LINTGATE_HOME`.
pub struct TestProject {
    pub dir: TempDir,
    pub home: PathBuf,
    pub root: PathBuf,
}

/// Captured result of one CLI run.
pub struct RunResult {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl From<Output> for RunResult {
    fn from(output: Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

impl TestProject {
    /// `lint` and `test` are the argv written to `.lintgate.toml`.
    pub fn new(lint: &[&str], test: &[&str]) -> Self {
        crate::test_log!("FIXTURE: Creating test project");

        let dir = TempDir::new().expect("Failed to create temp dir");
        let home = dir.path().join("home");
        let root = dir.path().join("project");
        fs::create_dir_all(root.join("src")).expect("Failed to create src dir");
        fs::create_dir_all(&home).expect("Failed to create home dir");

        let mut manifest = String::new();
        if !lint.is_empty() {
            manifest.push_str(&format!("lint = {}\n", toml_array(lint)));
        }
        if !test.is_empty() {
            manifest.push_str(&format!("test = {}\n", toml_array(test)));
        }
        fs::write(root.join(".lintgate.toml"), manifest).expect("Failed to write .lintgate.toml");

        Self { dir, home, root }
    }

    /// A project with no declared commands and no Makefile.
    pub fn empty() -> Self {
        Self::new(&[], &[])
    }

    /// `lintgate` with this project's home and a scrubbed environment.
    pub fn command(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_lintgate"));
        for name in SCRUBBED_ENV {
            command.env_remove(name);
        }
        command
            .env("LINTGATE_HOME", &self.home)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }

    pub fn run(&self, args: &[&str]) -> RunResult {
        self.command()
            .args(args)
            .output()
            .expect("Failed to run lintgate")
            .into()
    }

    pub fn run_with_env(&self, args: &[&str], env: &[(&str, &str)]) -> RunResult {
        let mut command = self.command();
        command.args(args);
        for (key, value) in env {
            command.env(key, value);
        }
        command.output().expect("Failed to run lintgate").into()
    }

    /// Run with `payload` piped on stdin, from a directory outside the
    /// project.
    pub fn run_with_stdin(&self, args: &[&str], payload: &str) -> RunResult {
        let mut child = self
            .command()
            .current_dir(self.dir.path())
            .args(args)
            .stdin(Stdio::piped())
            .spawn()
            .expect("Failed to start lintgate");
        {
            let stdin = child.stdin.as_mut().expect("Failed to open stdin");
            stdin.write_all(payload.as_bytes()).expect("Failed to write hook input");
        }
        child.wait_with_output().expect("Failed to read lintgate output").into()
    }

    pub fn root_str(&self) -> &str {
        self.root.to_str().expect("temp path is UTF-8")
    }

    pub fn skip_registry(&self) -> PathBuf {
        self.home.join("config").join("skips.json")
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        Path::new(&self.root).join(relative)
    }
}

fn toml_array(args: &[&str]) -> String {
    let quoted: Vec<String> = args.iter().map(|a| format!("{a:?}")).collect();
    format!("[{}]", quoted.join(", "))
}
