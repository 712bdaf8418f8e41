//! Classification of provider responses

use super::RawResponse;
use crate::protocol::AttemptOutcome;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;

/// Longest error message kept in an attempt's detail
const MAX_DETAIL_CHARS: usize = 300;

/// Classified response of one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub outcome: AttemptOutcome,
    pub retry_after: Option<Duration>,
    pub detail: Option<String>,
}

/// Map an HTTP response onto an attempt outcome.
///
/// A non-2xx body carrying one of the provider's quota markers is
/// `RateLimited` whatever the status (Gemini reports exhausted quota with a
/// 400 or 403 on some endpoints). Otherwise 401/403 is `AuthError`, 429 is
/// `RateLimited` and every other non-2xx status is `TransportError`.
pub fn classify_response(response: &RawResponse, quota_markers: &[&str]) -> Classification {
    if response.is_success() {
        return Classification {
            outcome: AttemptOutcome::Success,
            retry_after: None,
            detail: None,
        };
    }

    let details = serde_json::from_str::<Value>(&response.body)
        .ok()
        .and_then(|json| extract_error_details(&json));
    let body_hint = details
        .as_ref()
        .and_then(|d| d.retry_after)
        .or_else(|| retry_hint_in_text(&response.body));
    let retry_after = response.retry_after.or(body_hint);

    let lower_body = response.body.to_lowercase();
    let quota_exhausted = quota_markers
        .iter()
        .any(|marker| lower_body.contains(&marker.to_lowercase()));

    let outcome = if quota_exhausted {
        AttemptOutcome::RateLimited
    } else {
        match response.status {
            401 | 403 => AttemptOutcome::AuthError,
            429 => AttemptOutcome::RateLimited,
            _ => AttemptOutcome::TransportError,
        }
    };

    let message = details
        .map(|d| d.message)
        .unwrap_or_else(|| response.body.trim().to_string());
    let detail = if message.is_empty() {
        format!("HTTP {}", response.status)
    } else {
        format!("HTTP {}: {}", response.status, clip(&message))
    };

    Classification {
        outcome,
        retry_after: if outcome == AttemptOutcome::RateLimited {
            retry_after
        } else {
            None
        },
        detail: Some(detail),
    }
}

fn clip(message: &str) -> String {
    match message.char_indices().nth(MAX_DETAIL_CHARS) {
        Some((cut, _)) => format!("{}...", &message[..cut]),
        None => message.to_string(),
    }
}

/// Error details extracted from response body
#[derive(Debug)]
struct ErrorDetails {
    message: String,
    retry_after: Option<Duration>,
}

/// Extract error details from JSON response
fn extract_error_details(json: &Value) -> Option<ErrorDetails> {
    // OpenAI / Gemini format: { "error": { "message": "...", ... } }
    if let Some(error) = json.get("error") {
        if let Some(message) = error.get("message").and_then(|v| v.as_str()) {
            return Some(ErrorDetails {
                message: message.to_string(),
                retry_after: retry_after_field(error).or_else(|| gemini_retry_delay(error)),
            });
        }
    }

    // Generic format: { "message": "...", "retry_after": 5 }
    if let Some(message) = json.get("message").and_then(|v| v.as_str()) {
        return Some(ErrorDetails {
            message: message.to_string(),
            retry_after: retry_after_field(json),
        });
    }

    if let Some(error) = json.get("error").and_then(|v| v.as_str()) {
        return Some(ErrorDetails {
            message: error.to_string(),
            retry_after: retry_after_field(json),
        });
    }

    None
}

fn retry_after_field(json: &Value) -> Option<Duration> {
    json.get("retry_after")
        .and_then(|v| v.as_f64())
        .and_then(hint_seconds)
}

/// Positive, representable delays only; absurd hints are dropped
fn hint_seconds(secs: f64) -> Option<Duration> {
    if secs > 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}

/// Gemini: `error.details[].retryDelay = "17s"`
fn gemini_retry_delay(error: &Value) -> Option<Duration> {
    error
        .get("details")?
        .as_array()?
        .iter()
        .filter_map(|detail| detail.get("retryDelay").and_then(|v| v.as_str()))
        .find_map(parse_delay)
}

/// `"Please retry in 17.53s"` style hints in free text
fn retry_hint_in_text(body: &str) -> Option<Duration> {
    let lower = body.to_lowercase();
    let start = lower.find("retry in ")? + "retry in ".len();
    let token: String = lower[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '.')
        .collect();
    parse_delay(token.trim_end_matches('.'))
}

/// Parse `17s`, `1.5s`, `500ms` or a bare number of seconds
fn parse_delay(text: &str) -> Option<Duration> {
    let text = text.trim();
    let (number, divisor) = if let Some(ms) = text.strip_suffix("ms") {
        (ms, 1000.0)
    } else if let Some(secs) = text.strip_suffix('s') {
        (secs, 1.0)
    } else {
        (text, 1.0)
    };
    number
        .trim()
        .parse::<f64>()
        .ok()
        .map(|value| value / divisor)
        .and_then(hint_seconds)
}

/// Parse a Retry-After header value: delta-seconds or an HTTP date
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let value = header_value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let remaining = date.with_timezone(&Utc) - Utc::now();
    remaining.to_std().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKERS: &[&str] = &["RESOURCE_EXHAUSTED", "quota"];

    #[test]
    fn test_status_classification() {
        let cases = [
            (200, AttemptOutcome::Success),
            (401, AttemptOutcome::AuthError),
            (403, AttemptOutcome::AuthError),
            (429, AttemptOutcome::RateLimited),
            (500, AttemptOutcome::TransportError),
            (404, AttemptOutcome::TransportError),
        ];
        for (status, expected) in cases {
            let response = RawResponse::new(status, "{}");
            assert_eq!(
                classify_response(&response, MARKERS).outcome,
                expected,
                "status {}",
                status
            );
        }
    }

    #[test]
    fn test_quota_marker_in_body_wins() {
        let body = r#"{"error": {"code": 403, "message": "Quota exceeded for quota metric", "status": "PERMISSION_DENIED"}}"#;
        let response = RawResponse::new(403, body);
        let classification = classify_response(&response, MARKERS);
        assert_eq!(classification.outcome, AttemptOutcome::RateLimited);
        assert_eq!(
            classification.detail.as_deref(),
            Some("HTTP 403: Quota exceeded for quota metric")
        );
    }

    #[test]
    fn test_gemini_retry_delay() {
        let body = r#"{"error": {"code": 429, "message": "You exceeded your current quota", "status": "RESOURCE_EXHAUSTED",
            "details": [{"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "17s"}]}}"#;
        let response = RawResponse::new(429, body);
        let classification = classify_response(&response, MARKERS);
        assert_eq!(classification.outcome, AttemptOutcome::RateLimited);
        assert_eq!(classification.retry_after, Some(Duration::from_secs(17)));
    }

    #[test]
    fn test_header_hint_preferred() {
        let response = RawResponse::new(429, r#"{"message": "slow down", "retry_after": 3}"#)
            .with_retry_after(Duration::from_secs(9));
        let classification = classify_response(&response, &[]);
        assert_eq!(classification.retry_after, Some(Duration::from_secs(9)));

        let response = RawResponse::new(429, r#"{"message": "slow down", "retry_after": 3}"#);
        assert_eq!(
            classify_response(&response, &[]).retry_after,
            Some(Duration::from_secs(3))
        );
    }

    #[test]
    fn test_text_hint() {
        let response = RawResponse::new(429, "Rate limit reached. Please retry in 1.5s.");
        assert_eq!(
            classify_response(&response, &[]).retry_after,
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn test_success_body_with_marker_is_still_success() {
        let response = RawResponse::new(200, "the quota of questions is five");
        assert_eq!(classify_response(&response, MARKERS).outcome, AttemptOutcome::Success);
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after("soon"), None);
    }

    #[test]
    fn test_parse_delay_units() {
        assert_eq!(parse_delay("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_delay("2"), Some(Duration::from_secs(2)));
        assert_eq!(parse_delay("0s"), None);
        assert_eq!(parse_delay("1e300s"), None);
        assert_eq!(parse_delay("NaN"), None);
    }

    #[test]
    fn test_oversized_hints_are_dropped() {
        let bodies = [
            r#"{"error": {"message": "slow down", "retry_after": 1e300}}"#,
            r#"{"error": {"message": "quota", "details": [{"retryDelay": "1e300s"}]}}"#,
            "Rate limit reached. Please retry in 1e300s.",
        ];
        for body in bodies {
            let classification = classify_response(&RawResponse::new(429, body), &[]);
            assert_eq!(classification.outcome, AttemptOutcome::RateLimited);
            assert_eq!(classification.retry_after, None, "{}", body);
        }
    }
}
