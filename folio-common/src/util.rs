/// Returns `value` unless it is missing or only whitespace.
#[must_use]
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// The first `max_chars` characters of `text`, or `None` if `text` is not longer than that.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> Option<&str> {
    text.char_indices()
        .nth(max_chars)
        .map(|(byte_index, _)| &text[..byte_index])
}

/// Reading time in whole minutes at `words_per_minute`, never less than one.
#[must_use]
pub fn reading_minutes(text: &str, words_per_minute: usize) -> usize {
    text.split_whitespace()
        .count()
        .div_ceil(words_per_minute.max(1))
        .max(1)
}
