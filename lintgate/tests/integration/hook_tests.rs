use crate::common::{RunResult, TestProject, assert_contains, assert_empty, init_test_logging};

#[test]
fn test_failing_lint_blocks_with_repro_command() {
    init_test_logging();
    crate::test_log!("TEST START: test_failing_lint_blocks_with_repro_command");

    let project = TestProject::new(&["sh", "-c", "exit 1"], &[]);
    let result = project.run(&["--no-daemon", "lint", "--dir", project.root_str()]);

    assert_eq!(result.code, Some(2), "stderr: {}", result.stderr);
    assert_contains(&result.stdout, "BLOCKING: Run `cd ");
    assert_contains(&result.stdout, project.root_str());
    assert_contains(&result.stdout, "to fix lint failures");

    crate::test_log!("TEST PASS: test_failing_lint_blocks_with_repro_command");
}

#[test]
fn test_passing_test_then_cooldown_is_silent() {
    init_test_logging();
    crate::test_log!("TEST START: test_passing_test_then_cooldown_is_silent");

    let project = TestProject::new(&[], &["true"]);
    let env = [("LINTGATE_COOLDOWN_MS", "60000")];

    let first = project.run_with_env(&["--no-daemon", "test"], &env);
    assert_eq!(first.code, Some(2), "stderr: {}", first.stderr);
    assert_eq!(first.stdout.trim(), "Tests pass. Continue with your task.");

    let second = project.run_with_env(&["--no-daemon", "test"], &env);
    assert_eq!(second.code, Some(0), "stderr: {}", second.stderr);
    assert_empty(&second.stdout);

    crate::test_log!("TEST PASS: test_passing_test_then_cooldown_is_silent");
}

#[test]
fn test_lint_and_test_do_not_share_cooldown() {
    init_test_logging();
    crate::test_log!("TEST START: test_lint_and_test_do_not_share_cooldown");

    let project = TestProject::new(&["true"], &["true"]);
    let env = [("LINTGATE_COOLDOWN_MS", "60000")];

    assert_eq!(project.run_with_env(&["--no-daemon", "lint"], &env).code, Some(2));
    let test = project.run_with_env(&["--no-daemon", "test"], &env);
    assert_eq!(test.code, Some(2));
    assert_eq!(test.stdout.trim(), "Tests pass. Continue with your task.");

    crate::test_log!("TEST PASS: test_lint_and_test_do_not_share_cooldown");
}

#[test]
fn test_hook_payload_selects_project() {
    init_test_logging();
    crate::test_log!("TEST START: test_hook_payload_selects_project");

    let project = TestProject::new(&["sh", "-c", "exit 3"], &[]);
    let edited = project.path("src/lib.rs");
    let payload = format!(
        r#"{{"tool_name":"Edit","tool_input":{{"file_path":"{}"}}}}"#,
        edited.display()
    );

    let result = project.run_with_stdin(&["--no-daemon", "lint"], &payload);
    assert_eq!(result.code, Some(2), "stderr: {}", result.stderr);
    assert_contains(&result.stdout, project.root_str());

    crate::test_log!("TEST PASS: test_hook_payload_selects_project");
}

#[test]
fn test_no_command_is_silent() {
    init_test_logging();
    crate::test_log!("TEST START: test_no_command_is_silent");

    let project = TestProject::empty();
    let result = project.run(&["--no-daemon", "lint"]);

    assert_eq!(result.code, Some(0), "stderr: {}", result.stderr);
    assert_empty(&result.stdout);

    crate::test_log!("TEST PASS: test_no_command_is_silent");
}

#[test]
fn test_timeout_reports_limit() {
    init_test_logging();
    crate::test_log!("TEST START: test_timeout_reports_limit");

    let project = TestProject::new(&["sleep", "5"], &[]);
    let started = std::time::Instant::now();
    let result = project.run_with_env(&["--no-daemon", "lint"], &[("LINTGATE_LINT_TIMEOUT_MS", "300")]);

    assert_eq!(result.code, Some(2), "stderr: {}", result.stderr);
    assert_contains(&result.stdout, "Lint timed out after 300ms");
    assert!(started.elapsed() < std::time::Duration::from_secs(4));

    crate::test_log!("TEST PASS: test_timeout_reports_limit");
}

#[test]
fn test_missing_daemon_falls_back() {
    init_test_logging();
    crate::test_log!("TEST START: test_missing_daemon_falls_back");

    // No daemon is listening on the socket under LINTGATE_HOME.
    let project = TestProject::new(&["sh", "-c", "exit 1"], &[]);
    let result = project.run(&["lint"]);

    assert_eq!(result.code, Some(2), "stderr: {}", result.stderr);
    assert_contains(&result.stdout, "to fix lint failures");

    crate::test_log!("TEST PASS: test_missing_daemon_falls_back");
}

#[test]
fn test_invalid_env_is_internal_error() {
    init_test_logging();
    crate::test_log!("TEST START: test_invalid_env_is_internal_error");

    let project = TestProject::new(&["true"], &[]);
    let result = project.run_with_env(&["--no-daemon", "lint"], &[("LINTGATE_LINT_TIMEOUT_MS", "soon")]);

    assert_eq!(result.code, Some(1));
    assert_empty(&result.stdout);
    assert_contains(&result.stderr, "LINTGATE_LINT_TIMEOUT_MS");

    crate::test_log!("TEST PASS: test_invalid_env_is_internal_error");
}

#[test]
fn test_concurrent_processes_run_once() {
    init_test_logging();
    crate::test_log!("TEST START: test_concurrent_processes_run_once");

    let project = TestProject::new(&["sleep", "2"], &[]);
    let children: Vec<_> = (0..2)
        .map(|_| {
            project
                .command()
                .args(["--no-daemon", "lint"])
                .spawn()
                .expect("Failed to start lintgate")
        })
        .collect();
    let mut results: Vec<RunResult> = children
        .into_iter()
        .map(|child| child.wait_with_output().expect("Failed to read lintgate output").into())
        .collect();
    results.sort_by_key(|r| r.code);

    let (silent, ran) = (&results[0], &results[1]);
    assert_eq!(silent.code, Some(0), "stderr: {}", silent.stderr);
    assert_empty(&silent.stdout);
    assert_eq!(ran.code, Some(2), "stderr: {}", ran.stderr);
    assert_eq!(ran.stdout.trim(), "Lints pass. Continue with your task.");

    crate::test_log!("TEST PASS: test_concurrent_processes_run_once");
}
