//! PEP 503 project name normalization

use regex::Regex;
use std::sync::LazyLock;

static SEPARATOR_RUNS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[-_.]+").expect("separator pattern is valid")
});

/// Lowercase `name` and collapse every run of `-`, `_` and `.` into one `-`.
pub fn canonicalize(name: &str) -> String {
    SEPARATOR_RUNS
        .replace_all(&name.to_lowercase(), "-")
        .into_owned()
}
