//! Two-stage parsing of structured backend output.
//!
//! Backends asked for JSON frequently wrap it in prose or code fences, or
//! emit almost-valid JSON. Parsing is an explicit two-stage affair: a
//! strict parse first, then one bounded recovery pass (strip fences,
//! extract the outermost object, drop trailing commas). The outcome is a
//! value, not an exception: callers decide what a failure means for them.

use serde::de::DeserializeOwned;

/// Outcome of parsing structured output.
#[derive(Debug)]
pub enum ParseOutcome<T> {
    /// The raw text parsed as-is.
    Strict(T),
    /// The recovery pass produced a value; `note` records what was
    /// repaired.
    Recovered { value: T, note: String },
    /// Neither pass produced a value.
    Failed { reason: String },
}

impl<T> ParseOutcome<T> {
    /// The parsed value, if either pass succeeded.
    pub fn into_value(self) -> Option<T> {
        match self {
            ParseOutcome::Strict(value) | ParseOutcome::Recovered { value, .. } => Some(value),
            ParseOutcome::Failed { .. } => None,
        }
    }

    /// Whether the recovery pass was needed.
    pub fn is_recovered(&self) -> bool {
        matches!(self, ParseOutcome::Recovered { .. })
    }
}

/// Parse backend output into a typed value.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> ParseOutcome<T> {
    let trimmed = raw.trim();

    let first_error = match serde_json::from_str::<T>(trimmed) {
        Ok(value) => return ParseOutcome::Strict(value),
        Err(e) => e,
    };

    // Recovery pass, bounded: fence stripping, object extraction, comma
    // repair. No further guessing.
    let mut candidate = strip_code_fence(trimmed).unwrap_or(trimmed);
    if let Some(object) = extract_object(candidate) {
        candidate = object;
    }
    let repaired = drop_trailing_commas(candidate);

    match serde_json::from_str::<T>(&repaired) {
        Ok(value) => ParseOutcome::Recovered {
            value,
            note: format!("recovered from: {}", first_error),
        },
        Err(_) => ParseOutcome::Failed {
            reason: first_error.to_string(),
        },
    }
}

/// Contents of the first ``` fence, tolerating a `json` language tag.
fn strip_code_fence(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let after = after
        .strip_prefix("json")
        .or_else(|| after.strip_prefix("JSON"))
        .unwrap_or(after);
    let end = after.find("```")?;
    Some(after[..end].trim())
}

/// The outermost `{...}` span, if any.
fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| text[start..=end].trim())
}

/// Remove trailing commas before closing braces/brackets.
fn drop_trailing_commas(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();

    for (i, &ch) in chars.iter().enumerate() {
        if ch == ',' {
            let next_meaningful = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next_meaningful, Some('}') | Some(']')) {
                continue;
            }
        }
        result.push(ch);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        usable: bool,
        score: u32,
    }

    #[test]
    fn test_strict_parse() {
        let outcome = parse_structured::<Verdict>(r#"{"usable": true, "score": 80}"#);
        assert!(matches!(outcome, ParseOutcome::Strict(_)));
        assert_eq!(
            outcome.into_value().unwrap(),
            Verdict {
                usable: true,
                score: 80
            }
        );
    }

    #[test]
    fn test_recovers_from_code_fence() {
        let raw = "Here is my assessment:\n```json\n{\"usable\": false, \"score\": 40}\n```\nHope that helps.";
        let outcome = parse_structured::<Verdict>(raw);
        assert!(outcome.is_recovered());
        assert_eq!(
            outcome.into_value().unwrap(),
            Verdict {
                usable: false,
                score: 40
            }
        );
    }

    #[test]
    fn test_recovers_embedded_object() {
        let raw = r#"The verdict is {"usable": true, "score": 95} overall."#;
        let outcome = parse_structured::<Verdict>(raw);
        assert!(outcome.is_recovered());
        assert_eq!(outcome.into_value().unwrap().score, 95);
    }

    #[test]
    fn test_recovers_trailing_comma() {
        let raw = r#"{"usable": true, "score": 70,}"#;
        let outcome = parse_structured::<Verdict>(raw);
        assert!(outcome.is_recovered());
        assert_eq!(outcome.into_value().unwrap().score, 70);
    }

    #[test]
    fn test_failure_keeps_reason() {
        let outcome = parse_structured::<Verdict>("no structure at all");
        match outcome {
            ParseOutcome::Failed { reason } => assert!(!reason.is_empty()),
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn test_comma_inside_string_preserved() {
        #[derive(Debug, Deserialize)]
        struct Note {
            text: String,
        }

        let raw = r#"{"text": "one, two, three"}"#;
        let outcome = parse_structured::<Note>(raw);
        assert_eq!(outcome.into_value().unwrap().text, "one, two, three");
    }
}
