//! Token count heuristic.
//!
//! Word-length buckets approximate a BPE tokenizer closely enough for
//! budget checks and report statistics without shipping a vocabulary.

/// Estimated token count of `text`; empty text is zero, anything else at least one
pub fn estimate_tokens(text: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }
    let tokens: u64 = text
        .split_whitespace()
        .map(|word| match word.len() {
            0 => 0,
            1..=3 => 1,
            4..=7 => 2,
            8..=15 => 3,
            len => (len as u64).div_ceil(4),
        })
        .sum();
    tokens.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_whitespace() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("   "), 1);
    }

    #[test]
    fn test_word_buckets() {
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("word"), 2);
        assert_eq!(estimate_tokens("identifier"), 3);
        assert_eq!(estimate_tokens(&"x".repeat(40)), 10);
        assert_eq!(estimate_tokens("the quick brown fox"), 1 + 2 + 2 + 1);
    }
}
