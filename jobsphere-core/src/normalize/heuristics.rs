//! Schema-specific extraction from prose

use super::extract::strip_code_fences;
use serde_json::{Map, Value};

/// Item text of a numbered or bulleted line.
///
/// Recognizes `1. x`, `2) x`, `3: x`, `Q4. x`, `- x`, `* x` and `• x`.
pub fn enumerated_item(line: &str) -> Option<String> {
    let trimmed = line.trim_start();

    let unprefixed = trimmed
        .strip_prefix(|c: char| c == 'Q' || c == 'q')
        .filter(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
        .unwrap_or(trimmed);
    let digits = unprefixed
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if digits > 0 {
        let rest = unprefixed[digits..].strip_prefix(|c: char| matches!(c, '.' | ')' | ':'))?;
        return rest
            .starts_with(char::is_whitespace)
            .then(|| clean_item(rest))
            .flatten();
    }

    let rest = trimmed.strip_prefix(|c: char| matches!(c, '-' | '*' | '•'))?;
    if rest.starts_with(char::is_whitespace) {
        clean_item(rest)
    } else {
        None
    }
}

fn clean_item(item: &str) -> Option<String> {
    let item = item.trim().trim_end_matches(',').trim();
    let item = item
        .strip_prefix("**")
        .and_then(|inner| inner.strip_suffix("**"))
        .unwrap_or(item);
    let item = item.trim_matches('"').trim();
    (!item.is_empty()).then(|| item.to_string())
}

/// All enumerated items in the text, in order.
///
/// A single comma-separated line without any markers is split on commas.
pub fn enumerated_list(text: &str) -> Vec<String> {
    let body = strip_code_fences(text).unwrap_or(text);
    let items: Vec<String> = body.lines().filter_map(enumerated_item).collect();
    if !items.is_empty() {
        return items;
    }

    let lines: Vec<&str> = body.lines().filter(|l| !l.trim().is_empty()).collect();
    match lines.as_slice() {
        [single] if single.contains(',') => single
            .split(',')
            .filter_map(clean_item)
            .collect(),
        _ => Vec::new(),
    }
}

/// Group enumerated items under headings naming record fields.
///
/// A heading matches a field when, stripped of markdown and lowercased, it
/// starts with the field name (underscores read as spaces). Sections without
/// items are omitted.
pub fn sections(text: &str, fields: &[&str]) -> Map<String, Value> {
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    let mut current: Option<usize> = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if let Some(item) = enumerated_item(line) {
            if let Some(index) = current {
                grouped[index].1.push(item);
            }
            continue;
        }

        if let Some(field) = heading_field(line, fields) {
            current = Some(match grouped.iter().position(|(name, _)| name == field) {
                Some(index) => index,
                None => {
                    grouped.push((field.to_string(), Vec::new()));
                    grouped.len() - 1
                }
            });
        } else if let (Some(index), true) = (current, line.trim_end().ends_with('?')) {
            if let Some(item) = clean_item(line) {
                grouped[index].1.push(item);
            }
        }
    }

    grouped
        .into_iter()
        .filter(|(_, items)| !items.is_empty())
        .map(|(name, items)| {
            let items = items.into_iter().map(Value::String).collect();
            (name, Value::Array(items))
        })
        .collect()
}

fn heading_field<'a>(line: &str, fields: &[&'a str]) -> Option<&'a str> {
    let heading: String = line
        .chars()
        .filter(|c| !matches!(*c, '#' | '*' | ':' | '_'))
        .collect::<String>()
        .trim()
        .to_lowercase();
    if heading.is_empty() || heading.len() > 60 {
        return None;
    }

    fields
        .iter()
        .copied()
        .find(|field| heading.starts_with(&field.replace('_', " ")))
}

/// The prose itself, minus code fences and surrounding whitespace
pub fn prose(text: &str) -> Option<String> {
    let body = strip_code_fences(text).unwrap_or(text).trim();
    (!body.is_empty()).then(|| body.to_string())
}
