//! Locating and repairing JSON inside free-form text

use serde_json::Value;

/// Strict parse of the whole text
pub fn parse_strict(text: &str) -> Option<Value> {
    serde_json::from_str(text).ok()
}

/// Parse, retrying once after repairing common malformations
pub fn parse_lenient(text: &str) -> Option<Value> {
    parse_strict(text).or_else(|| repair(text).and_then(|fixed| parse_strict(&fixed)))
}

/// Every balanced `{...}` or `[...]` span, longest first.
///
/// Brackets inside string literals are ignored. Spans of equal length keep
/// their order of appearance. An opener that never balances is skipped and
/// scanning resumes right after it, so JSON following a stray bracket in
/// prose is still found.
pub fn balanced_spans(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if matches!(bytes[i], b'{' | b'[') {
            if let Some(end) = matching_close(bytes, i) {
                spans.push(&text[i..=end]);
                i = end + 1;
                continue;
            }
        }
        i += 1;
    }

    spans.sort_by(|a, b| b.len().cmp(&a.len()));
    spans
}

fn matching_close(bytes: &[u8], open: usize) -> Option<usize> {
    let mut expected = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[open..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => expected.push(b'}'),
            b'[' => expected.push(b']'),
            b'}' | b']' => {
                if expected.pop() != Some(byte) {
                    return None;
                }
                if expected.is_empty() {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }

    None
}

/// Fix malformations models commonly produce.
///
/// Strips a byte-order mark and removes trailing commas before a closing
/// bracket. Returns `None` when nothing needed fixing.
pub fn repair(text: &str) -> Option<String> {
    let stripped = text.trim_start_matches('\u{feff}');
    let mut repaired = String::with_capacity(stripped.len());
    let mut changed = stripped.len() != text.len();
    let mut in_string = false;
    let mut escaped = false;
    let chars: Vec<char> = stripped.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            repaired.push(c);
            continue;
        }

        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                changed = true;
                continue;
            }
        }
        repaired.push(c);
    }

    changed.then_some(repaired)
}

/// Content of the first fenced code block, if any
pub fn strip_code_fences(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let body_start = after_fence.find('\n').map(|n| n + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let end = body.find("```").unwrap_or(body.len());
    Some(body[..end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_balanced_spans_longest_first() {
        let text = r#"Sure! [note] Here it is: {"a": [1, 2], "b": "x"} hope it helps"#;
        let spans = balanced_spans(text);
        assert_eq!(spans[0], r#"{"a": [1, 2], "b": "x"}"#);
        assert_eq!(spans[1], "[note]");
    }

    #[test]
    fn test_brackets_inside_strings_ignored() {
        let text = r#"{"q": "what does } mean?", "n": 1}"#;
        assert_eq!(balanced_spans(text), vec![text]);
    }

    #[test]
    fn test_stray_opener_skipped() {
        let text = r#"{ oops, then {"ok": true}"#;
        assert_eq!(balanced_spans(text), vec![r#"{"ok": true}"#]);
    }

    #[test]
    fn test_mismatched_closer_rejected() {
        assert!(balanced_spans("[1, 2}").is_empty());
    }

    #[test]
    fn test_repair_trailing_commas() {
        let fixed = repair(r#"{"a": [1, 2,], "b": "x, ]",}"#).unwrap();
        assert_eq!(fixed, r#"{"a": [1, 2], "b": "x, ]"}"#);
        assert_eq!(parse_lenient(r#"[1, 2, ]"#), Some(json!([1, 2])));
    }

    #[test]
    fn test_repair_noop() {
        assert_eq!(repair(r#"{"a": 1}"#), None);
    }

    #[test]
    fn test_bom_stripped() {
        assert_eq!(parse_lenient("\u{feff}{\"a\": 1}"), Some(json!({"a": 1})));
    }

    #[test]
    fn test_strip_code_fences() {
        let text = "Here you go:\n```json\n{\"a\": 1}\n```\nThanks";
        assert_eq!(strip_code_fences(text), Some("{\"a\": 1}"));
        assert_eq!(strip_code_fences("no fences"), None);
    }
}
