//! Feed type detection by filename

use regex::Regex;

use crate::document::Named;

/// Select the inputs whose filename matches `pattern` at its start
///
/// Matching is case-sensitive and only anchored at the front, so trailing
/// extensions are irrelevant. Relative input order is preserved.
pub fn autotype<'a, T: Named>(pattern: &Regex, inputs: &'a [T]) -> Vec<&'a T> {
    inputs
        .iter()
        .filter(|input| matches_at_start(pattern, input.filename()))
        .collect()
}

fn matches_at_start(pattern: &Regex, filename: &str) -> bool {
    pattern.find(filename).is_some_and(|m| m.start() == 0)
}
