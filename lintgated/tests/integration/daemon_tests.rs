use std::io::{BufRead, BufReader, Write};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::UnixStream;
use std::process::Command;

use crate::common::{DaemonProcess, init_test_logging};

fn send_line(socket: &std::path::Path, line: &str) -> serde_json::Value {
    let mut stream = UnixStream::connect(socket).expect("Failed to connect to lintgated");
    stream.write_all(line.as_bytes()).unwrap();
    stream.write_all(b"\n").unwrap();
    let mut reply = String::new();
    BufReader::new(stream).read_line(&mut reply).unwrap();
    serde_json::from_str(&reply).unwrap()
}

#[test]
fn test_help() {
    init_test_logging();
    crate::test_log!("TEST START: test_help");

    let output = Command::new(env!("CARGO_BIN_EXE_lintgated"))
        .arg("--help")
        .output()
        .expect("Failed to run lintgated --help");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--socket"), "{stdout}");
    assert!(stdout.contains("--log-dir"), "{stdout}");

    crate::test_log!("TEST PASS: test_help");
}

#[test]
fn test_serves_ping_and_stats() {
    init_test_logging();
    crate::test_log!("TEST START: test_serves_ping_and_stats");

    let daemon = DaemonProcess::start();
    let mode = std::fs::metadata(&daemon.socket).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);

    let pong = send_line(&daemon.socket, r#"{"method":"ping","params":""}"#);
    assert_eq!(pong["result"], "pong");
    assert_eq!(pong["exit_code"], 0);

    let stats = send_line(&daemon.socket, r#"{"method":"stats","params":""}"#);
    let snapshot: serde_json::Value = serde_json::from_str(stats["result"].as_str().unwrap()).unwrap();
    assert_eq!(snapshot["mode"], "daemon");
    assert_eq!(snapshot["requests"], 2);

    crate::test_log!("TEST PASS: test_serves_ping_and_stats");
}

#[test]
fn test_refuses_second_instance() {
    init_test_logging();
    crate::test_log!("TEST START: test_refuses_second_instance");

    let daemon = DaemonProcess::start();
    let output = Command::new(env!("CARGO_BIN_EXE_lintgated"))
        .env("LINTGATE_HOME", daemon.home())
        .env_remove("LINTGATE_SOCKET")
        .output()
        .expect("Failed to run second lintgated");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("already listening"), "{stderr}");
    assert!(daemon.socket.exists());

    crate::test_log!("TEST PASS: test_refuses_second_instance");
}

#[test]
fn test_sigterm_removes_socket() {
    init_test_logging();
    crate::test_log!("TEST START: test_sigterm_removes_socket");

    let daemon = DaemonProcess::start();
    let socket = daemon.socket.clone();

    let status = daemon.terminate();
    assert!(status.success(), "exit status: {status:?}");
    assert!(!socket.exists());

    crate::test_log!("TEST PASS: test_sigterm_removes_socket");
}
