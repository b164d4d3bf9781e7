use crate::common::{TestProject, assert_contains, assert_empty, init_test_logging};

#[test]
fn test_skip_add_silences_then_remove_restores() {
    init_test_logging();
    crate::test_log!("TEST START: test_skip_add_silences_then_remove_restores");

    let project = TestProject::new(&["sh", "-c", "exit 1"], &[]);
    let root = project.root_str();

    let added = project.run(&["--no-daemon", "skip", "add", "lint", "--dir", root]);
    assert_eq!(added.code, Some(0), "stderr: {}", added.stderr);
    assert_contains(&added.stdout, "Skipping lint in");

    let skipped = project.run(&["--no-daemon", "lint", "--dir", root]);
    assert_eq!(skipped.code, Some(0));
    assert_empty(&skipped.stdout);

    let removed = project.run(&["--no-daemon", "skip", "remove", "lint", "--dir", root]);
    assert_eq!(removed.code, Some(0), "stderr: {}", removed.stderr);

    let ran = project.run(&["--no-daemon", "lint", "--dir", root]);
    assert_eq!(ran.code, Some(2));
    assert_contains(&ran.stdout, "to fix lint failures");

    crate::test_log!("TEST PASS: test_skip_add_silences_then_remove_restores");
}

#[test]
fn test_skip_on_root_covers_subdirectories() {
    init_test_logging();
    crate::test_log!("TEST START: test_skip_on_root_covers_subdirectories");

    let project = TestProject::new(&["sh", "-c", "exit 1"], &[]);
    project.run(&["--no-daemon", "skip", "add", "lint"]);

    let src = project.path("src");
    let result = project.run(&["--no-daemon", "lint", "--dir", src.to_str().unwrap()]);
    assert_eq!(result.code, Some(0), "stderr: {}", result.stderr);
    assert_empty(&result.stdout);

    crate::test_log!("TEST PASS: test_skip_on_root_covers_subdirectories");
}

#[test]
fn test_skip_list_and_clear() {
    init_test_logging();
    crate::test_log!("TEST START: test_skip_list_and_clear");

    let project = TestProject::empty();
    let empty = project.run(&["--no-daemon", "skip", "list"]);
    assert_eq!(empty.code, Some(0));
    assert_eq!(empty.stdout.trim(), "No directories are skipped");

    project.run(&["--no-daemon", "skip", "add", "lint", "test"]);
    let listed = project.run(&["--no-daemon", "skip", "list"]);
    assert_eq!(listed.code, Some(0), "stderr: {}", listed.stderr);
    assert_contains(&listed.stdout, project.root_str());
    assert_contains(&listed.stdout, ": lint, test");

    let cleared = project.run(&["--no-daemon", "skip", "clear"]);
    assert_eq!(cleared.code, Some(0));
    let after = project.run(&["--no-daemon", "skip", "list"]);
    assert_eq!(after.stdout.trim(), "No directories are skipped");

    crate::test_log!("TEST PASS: test_skip_list_and_clear");
}

#[test]
fn test_corrupted_registry_is_internal_error() {
    init_test_logging();
    crate::test_log!("TEST START: test_corrupted_registry_is_internal_error");

    let project = TestProject::new(&["true"], &[]);
    let registry = project.skip_registry();
    std::fs::create_dir_all(registry.parent().unwrap()).unwrap();
    std::fs::write(&registry, "{not json").unwrap();

    let result = project.run(&["--no-daemon", "lint"]);
    assert_eq!(result.code, Some(1));
    assert_empty(&result.stdout);
    assert_contains(&result.stderr, "lintgate:");

    crate::test_log!("TEST PASS: test_corrupted_registry_is_internal_error");
}
