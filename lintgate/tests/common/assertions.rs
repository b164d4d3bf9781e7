pub fn assert_contains(haystack: &str, needle: &str) {
    assert!(
        haystack.contains(needle),
        "Expected to find '{needle}' in output, got: {haystack}"
    );
}

pub fn assert_empty(output: &str) {
    assert!(output.trim().is_empty(), "Expected empty output, got: {output}");
}
