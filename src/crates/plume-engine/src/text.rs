//! Text heuristics shared by the packer and the rule checker.
//!
//! Everything here is pure, allocation-light, and deterministic; the rule
//! checker runs on every generation and has to stay well under 100ms.

/// Split text into sentences, keeping terminators.
///
/// Splits on `.`, `!`, `?`; fragments are trimmed and empty ones dropped.
/// A trailing fragment without a terminator is kept.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for (idx, ch) in text.char_indices() {
        if matches!(ch, '.' | '!' | '?') {
            let end = idx + ch.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

/// Split text into paragraphs on blank lines.
pub fn split_paragraphs(text: &str) -> Vec<&str> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Truncate to at most `max_chars` characters, respecting char
/// boundaries.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Levenshtein edit distance over characters.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(prev[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }

    prev[b.len()]
}

/// Normalized edit similarity in `[0, 1]`; 1.0 means identical.
pub fn edit_similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Short deterministic digest of text, hex-encoded.
pub fn content_digest(text: &str) -> String {
    use std::hash::{Hash, Hasher};

    // DefaultHasher::new() is keyed with fixed constants, so the digest
    // is stable across processes.
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    text.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Whether a line reads as a key point: carries a colon, a leading
/// enumerator, or a bullet marker.
pub fn is_key_point_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    if trimmed.is_empty() {
        return false;
    }
    if trimmed.contains(':') {
        return true;
    }
    if trimmed.starts_with('-') || trimmed.starts_with('*') || trimmed.starts_with('•') {
        return true;
    }
    // Leading enumerator: "1." or "2)"
    let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    if !digits.is_empty() {
        let rest = &trimmed[digits.len()..];
        return rest.starts_with('.') || rest.starts_with(')');
    }
    false
}

/// Fraction of sentences that carry dialogue (quoted speech).
pub fn dialogue_ratio(sentences: &[&str]) -> f64 {
    if sentences.is_empty() {
        return 0.0;
    }
    let spoken = sentences
        .iter()
        .filter(|s| s.contains('"') || s.contains('\u{201c}') || s.contains('\u{201d}'))
        .count();
    spoken as f64 / sentences.len() as f64
}

/// Non-overlapping occurrence count of `needle` in `haystack`.
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.match_indices(needle).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences("One. Two! Three? And a tail");
        assert_eq!(sentences, vec!["One.", "Two!", "Three?", "And a tail"]);
    }

    #[test]
    fn test_split_sentences_empty() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn test_split_paragraphs() {
        let paragraphs = split_paragraphs("First paragraph.\n\nSecond.\n\n\n\nThird.");
        assert_eq!(paragraphs.len(), 3);
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_edit_similarity() {
        assert_eq!(edit_similarity("same", "same"), 1.0);
        assert_eq!(edit_similarity("", ""), 1.0);
        assert!(edit_similarity("abcdefghij", "abcdefghix") > 0.85);
        assert!(edit_similarity("abcdefghij", "zzzzzzzzzz") < 0.2);
    }

    #[test]
    fn test_content_digest_deterministic() {
        assert_eq!(content_digest("scene one"), content_digest("scene one"));
        assert_ne!(content_digest("scene one"), content_digest("scene two"));
        assert_eq!(content_digest("x").len(), 16);
    }

    #[test]
    fn test_key_point_lines() {
        assert!(is_key_point_line("Mara: stubborn, left-handed"));
        assert!(is_key_point_line("- harbor district"));
        assert!(is_key_point_line("* lighthouse"));
        assert!(is_key_point_line("1. opening image"));
        assert!(is_key_point_line("2) rising action"));
        assert!(!is_key_point_line("She walked to the pier."));
        assert!(!is_key_point_line(""));
    }

    #[test]
    fn test_dialogue_ratio() {
        let sentences = vec![r#""Hello," she said."#, "He nodded.", r#""Goodbye.""#];
        let ratio = dialogue_ratio(&sentences);
        assert!((ratio - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(dialogue_ratio(&[]), 0.0);
    }

    #[test]
    fn test_count_occurrences() {
        assert_eq!(count_occurrences("Mara met Mara", "Mara"), 2);
        assert_eq!(count_occurrences("nothing here", "Mara"), 0);
        assert_eq!(count_occurrences("text", ""), 0);
    }
}
