/// Approximate token count using the ~4 chars per token heuristic.
const CHARS_PER_TOKEN: f64 = 4.0;

/// Average silent reading speed used for reading-time estimates.
const WORDS_PER_MINUTE: f64 = 200.0;

/// Count whitespace-delimited tokens.
#[must_use]
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Estimate reading time in whole minutes, rounded up.
#[must_use]
pub fn reading_time_minutes(word_count: usize) -> u32 {
    (word_count as f64 / WORDS_PER_MINUTE).ceil() as u32
}

/// Estimate tokens from a character count.
#[must_use]
pub fn estimate_tokens(char_count: usize) -> u64 {
    (char_count as f64 / CHARS_PER_TOKEN).ceil() as u64
}

/// Estimate tokens from a string.
#[must_use]
pub fn estimate_tokens_str(s: &str) -> u64 {
    estimate_tokens(s.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_tokens_basic() {
        assert_eq!(estimate_tokens(0), 0);
        assert_eq!(estimate_tokens(4), 1);
        assert_eq!(estimate_tokens(5), 2);
        assert_eq!(estimate_tokens(100), 25);
    }

    #[test]
    fn estimate_tokens_counts_chars_not_bytes() {
        assert_eq!(estimate_tokens_str("hello world"), 3); // ceil(11/4) = 3
        assert_eq!(estimate_tokens_str("ééééé"), 2);
    }

    #[test]
    fn count_words_splits_on_any_whitespace() {
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("  one\ttwo\n\nthree "), 3);
    }

    #[test]
    fn reading_time_rounds_up() {
        assert_eq!(reading_time_minutes(0), 0);
        assert_eq!(reading_time_minutes(1), 1);
        assert_eq!(reading_time_minutes(200), 1);
        assert_eq!(reading_time_minutes(201), 2);
    }
}
