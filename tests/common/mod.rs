#![allow(dead_code)]

/// Output comparisons ignore formatting: only the token text matters.
pub fn remove_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Asserts `actual` equals `expected` modulo whitespace.
#[track_caller]
pub fn assert_code_eq(actual: &str, expected: &str) {
    assert_eq!(
        remove_whitespace(actual),
        remove_whitespace(expected),
        "\nactual output:\n{actual}"
    );
}
