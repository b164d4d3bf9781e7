use crate::common::{TestProject, assert_contains, init_test_logging};

#[test]
fn test_help_lists_commands() {
    init_test_logging();
    crate::test_log!("TEST START: test_help_lists_commands");

    let project = TestProject::empty();
    let result = project.run(&["--help"]);

    assert_eq!(result.code, Some(0));
    for command in ["lint", "test", "skip", "stats"] {
        assert_contains(&result.stdout, command);
    }

    crate::test_log!("TEST PASS: test_help_lists_commands");
}

#[test]
fn test_skip_add_requires_types() {
    init_test_logging();
    crate::test_log!("TEST START: test_skip_add_requires_types");

    let project = TestProject::empty();
    let result = project.run(&["skip", "add"]);
    assert_ne!(result.code, Some(0));

    let unknown = project.run(&["skip", "add", "build"]);
    assert_ne!(unknown.code, Some(0));
    assert_contains(&unknown.stderr, "build");

    crate::test_log!("TEST PASS: test_skip_add_requires_types");
}

#[test]
fn test_stats_reports_local_mode() {
    init_test_logging();
    crate::test_log!("TEST START: test_stats_reports_local_mode");

    let project = TestProject::empty();
    let result = project.run(&["--no-daemon", "stats"]);

    assert_eq!(result.code, Some(0), "stderr: {}", result.stderr);
    let stats: serde_json::Value = serde_json::from_str(result.stdout.trim()).unwrap();
    assert_eq!(stats["mode"], "local");
    assert_eq!(stats["requests"], 1);

    crate::test_log!("TEST PASS: test_stats_reports_local_mode");
}
