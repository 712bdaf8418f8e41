//! Response normalization
//!
//! Providers answer with clean JSON, JSON buried in commentary or code fences,
//! or plain prose. [`Normalizer::normalize`] recovers the caller's expected
//! shape in three stages, stopping at the first that yields a conforming value:
//!
//! 1. strict parse of the whole payload (after light repair)
//! 2. the balanced `{...}`/`[...]` spans of the payload, longest first
//! 3. the schema's [`Heuristic`] applied to the prose
//!
//! Every stage ends in [`conform`], so whatever comes out matches the schema.

pub mod extract;
pub mod heuristics;
pub mod schema;

pub use schema::{conform, ExpectedSchema, Field, Heuristic, SchemaViolation, Shape};

use crate::config::{truncate_chars, DEFAULT_PAYLOAD_BUDGET};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Payload pulled out of a provider's response envelope
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Generated text that still needs parsing
    Text(String),
    /// Already structured data (job board results)
    Structured(Value),
}

/// Why a payload could not be normalized
#[derive(Debug, Error)]
#[error("cannot normalize into '{schema}': {kind}")]
pub struct NormalizationError {
    pub schema: String,
    pub kind: NormalizationErrorKind,
    /// The offending payload, truncated for diagnostics
    pub raw_payload: String,
}

#[derive(Debug, Error)]
pub enum NormalizationErrorKind {
    #[error("payload is empty")]
    Empty,

    #[error("no structured content found")]
    NoStructure,

    #[error("content does not match: {0}")]
    Violation(#[from] SchemaViolation),
}

/// Extraction stage that produced a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Strict,
    Bracket,
    Heuristic,
}

/// Turns raw provider payloads into schema-conforming values
#[derive(Debug, Clone)]
pub struct Normalizer {
    payload_budget: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self {
            payload_budget: DEFAULT_PAYLOAD_BUDGET,
        }
    }

    /// Limit how much of a failing payload is kept in errors
    pub fn with_payload_budget(mut self, budget: usize) -> Self {
        self.payload_budget = budget;
        self
    }

    /// Normalize an extracted payload
    pub fn normalize_payload(
        &self,
        payload: Payload,
        schema: &ExpectedSchema,
    ) -> Result<Value, NormalizationError> {
        match payload {
            Payload::Text(text) => self.normalize(&text, schema),
            Payload::Structured(value) => {
                let raw = value.to_string();
                conform(value, &schema.shape)
                    .map_err(|violation| self.error(schema, violation.into(), &raw))
            }
        }
    }

    /// Normalize free-form text into `schema`
    pub fn normalize(
        &self,
        raw: &str,
        schema: &ExpectedSchema,
    ) -> Result<Value, NormalizationError> {
        self.normalize_traced(raw, schema).map(|(value, _)| value)
    }

    /// Like [`normalize`](Self::normalize), also reporting the stage that succeeded
    pub fn normalize_traced(
        &self,
        raw: &str,
        schema: &ExpectedSchema,
    ) -> Result<(Value, Stage), NormalizationError> {
        let text = raw.trim_start_matches('\u{feff}').trim();
        if text.is_empty() {
            return Err(self.error(schema, NormalizationErrorKind::Empty, raw));
        }

        let mut violation = None;

        if let Some(value) = extract::parse_lenient(text) {
            match conform(value, &schema.shape) {
                Ok(value) => return Ok(self.done(value, Stage::Strict, schema)),
                Err(e) => violation = Some(e),
            }
        }

        if !matches!(schema.shape, Shape::Text | Shape::String) {
            for span in extract::balanced_spans(text) {
                let Some(value) = extract::parse_lenient(span) else {
                    continue;
                };
                match conform(value, &schema.shape) {
                    Ok(value) => return Ok(self.done(value, Stage::Bracket, schema)),
                    Err(e) => {
                        violation.get_or_insert(e);
                    }
                }
            }
        }

        if let Some(value) = apply_heuristic(text, schema) {
            match conform(value, &schema.shape) {
                Ok(value) => return Ok(self.done(value, Stage::Heuristic, schema)),
                Err(e) => {
                    violation.get_or_insert(e);
                }
            }
        }

        let kind = match violation {
            Some(violation) => NormalizationErrorKind::Violation(violation),
            None => NormalizationErrorKind::NoStructure,
        };
        Err(self.error(schema, kind, raw))
    }

    fn done(&self, value: Value, stage: Stage, schema: &ExpectedSchema) -> (Value, Stage) {
        debug!(schema = %schema.name, stage = ?stage, "payload normalized");
        (value, stage)
    }

    fn error(
        &self,
        schema: &ExpectedSchema,
        kind: NormalizationErrorKind,
        raw: &str,
    ) -> NormalizationError {
        NormalizationError {
            schema: schema.name.clone(),
            kind,
            raw_payload: truncate_chars(raw, self.payload_budget),
        }
    }
}

fn apply_heuristic(text: &str, schema: &ExpectedSchema) -> Option<Value> {
    match &schema.heuristic {
        Heuristic::None => None,
        Heuristic::Prose => heuristics::prose(text).map(Value::String),
        Heuristic::ProseField { field } => heuristics::prose(text).map(|prose| {
            let mut record = serde_json::Map::new();
            record.insert(field.clone(), Value::String(prose));
            Value::Object(record)
        }),
        Heuristic::EnumeratedList => {
            let items = heuristics::enumerated_list(text);
            (!items.is_empty())
                .then(|| Value::Array(items.into_iter().map(Value::String).collect()))
        }
        Heuristic::Sections => {
            let Shape::Record { fields } = &schema.shape else {
                return None;
            };
            let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
            let grouped = heuristics::sections(text, &names);
            (!grouped.is_empty()).then_some(Value::Object(grouped))
        }
    }
}
