/// Joins words with single spaces, dropping leading and trailing whitespace.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case- and spacing-insensitive comparison key for names and fragment text.
pub fn normalized_key(s: &str) -> String {
    collapse_whitespace(s).to_lowercase()
}
