//! Expected output shapes and conformance checking

use crate::protocol::TaskType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;
use thiserror::Error;

/// Structural shape a normalized value must have
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    /// Non-empty free text
    Text,
    String,
    Integer,
    Number,
    Boolean,
    List {
        items: Box<Shape>,
        #[serde(default)]
        min_items: usize,
    },
    Record {
        fields: Vec<Field>,
    },
}

impl Shape {
    pub fn list(items: Shape) -> Self {
        Shape::List {
            items: Box::new(items),
            min_items: 0,
        }
    }

    pub fn non_empty_list(items: Shape) -> Self {
        Shape::List {
            items: Box::new(items),
            min_items: 1,
        }
    }

    pub fn strings() -> Self {
        Self::list(Shape::String)
    }

    pub fn record(fields: Vec<Field>) -> Self {
        Shape::Record { fields }
    }

    /// Canonical job posting
    pub fn job_item() -> Self {
        Self::record(vec![
            Field::required("title", Shape::String),
            Field::required("company", Shape::String),
            Field::required("url", Shape::String),
            Field::optional("id", Shape::String),
            Field::optional("location", Shape::String),
            Field::optional("salary", Shape::String),
            Field::optional("description", Shape::String),
            Field::optional("job_type", Shape::String),
            Field::optional("posted_date", Shape::String),
            Field::optional("remote", Shape::Boolean),
            Field::optional("tags", Shape::strings()),
            Field::optional("sources", Shape::strings()),
        ])
    }

    /// Whether the shape is a list of job postings
    pub fn is_job_list(&self) -> bool {
        match self {
            Shape::List { items, .. } => **items == Shape::job_item(),
            _ => false,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Shape::Text => "text",
            Shape::String => "string",
            Shape::Integer => "integer",
            Shape::Number => "number",
            Shape::Boolean => "boolean",
            Shape::List { .. } => "list",
            Shape::Record { .. } => "record",
        }
    }
}

/// A named member of a record shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub shape: Shape,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl Field {
    pub fn required(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            required: false,
        }
    }
}

/// Last-resort extraction used when no JSON can be found in a payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Heuristic {
    #[default]
    None,
    /// Numbered or bulleted lines become list items
    EnumeratedList,
    /// Headed sections become record fields holding enumerated items
    Sections,
    /// The whole prose becomes the named text field
    ProseField { field: String },
    /// The whole prose is the value
    Prose,
}

/// Shape the caller needs back, plus how to recover it from prose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedSchema {
    pub name: String,
    pub shape: Shape,
    #[serde(default)]
    pub heuristic: Heuristic,
}

impl ExpectedSchema {
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            heuristic: Heuristic::None,
        }
    }

    pub fn with_heuristic(mut self, heuristic: Heuristic) -> Self {
        self.heuristic = heuristic;
        self
    }

    /// List of canonical job postings
    pub fn job_list() -> Self {
        Self::new("job_list", Shape::list(Shape::job_item()))
    }

    /// Default schema of a task type
    pub fn for_task(task: TaskType) -> Self {
        match task {
            TaskType::GenerateQuestions => Self::new(
                "interview_questions",
                Shape::record(vec![
                    Field::required("technical", Shape::non_empty_list(Shape::String)),
                    Field::required("behavioral", Shape::non_empty_list(Shape::String)),
                    Field::optional("company", Shape::strings()),
                    Field::optional("general", Shape::strings()),
                ]),
            )
            .with_heuristic(Heuristic::Sections),
            TaskType::GenerateAnswer => {
                Self::new("answer", Shape::Text).with_heuristic(Heuristic::Prose)
            }
            TaskType::GenerateCoverLetter => Self::new(
                "cover_letter",
                Shape::record(vec![Field::required("cover_letter", Shape::Text)]),
            )
            .with_heuristic(Heuristic::ProseField {
                field: "cover_letter".to_string(),
            }),
            TaskType::AnalyzeResume => Self::new(
                "resume_profile",
                Shape::record(vec![
                    Field::required("skills", Shape::strings()),
                    Field::required("experience_years", Shape::Integer),
                    Field::required("job_titles", Shape::strings()),
                    Field::optional("location_preference", Shape::String),
                    Field::optional("education", Shape::String),
                    Field::optional("certifications", Shape::strings()),
                ]),
            ),
            TaskType::GenerateResume => Self::new(
                "resume",
                Shape::record(vec![Field::required("resume", Shape::Text)]),
            )
            .with_heuristic(Heuristic::ProseField {
                field: "resume".to_string(),
            }),
            TaskType::MatchJobs => Self::new(
                "job_match",
                Shape::record(vec![
                    Field::required("score", Shape::Number),
                    Field::required("matching_skills", Shape::strings()),
                    Field::required("missing_skills", Shape::strings()),
                    Field::required("reason", Shape::String),
                    Field::optional("confidence", Shape::String),
                ]),
            ),
            TaskType::SearchJobs => Self::job_list(),
            TaskType::ResearchCompany => Self::new(
                "company_research",
                Shape::record(vec![
                    Field::required("company_type", Shape::String),
                    Field::required("culture_keywords", Shape::strings()),
                    Field::required("recommended_template", Shape::String),
                    Field::optional("accepted_templates", Shape::strings()),
                    Field::optional("resume_format_tips", Shape::strings()),
                    Field::optional("key_skills_to_highlight", Shape::strings()),
                    Field::optional("tone", Shape::String),
                    Field::optional("template_reasoning", Shape::String),
                ]),
            ),
            TaskType::SuggestSkills => Self::new("skills", Shape::non_empty_list(Shape::String))
                .with_heuristic(Heuristic::EnumeratedList),
        }
    }
}

/// A value that does not match its shape
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct SchemaViolation {
    /// Location of the offending value, e.g. `$.technical[2]`
    pub path: String,
    pub expected: String,
    pub found: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "at '{}': expected {}, found {}",
            self.path, self.expected, self.found
        )
    }
}

impl SchemaViolation {
    fn new(path: &str, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    fn mismatch(path: &str, shape: &Shape, value: &Value) -> Self {
        Self::new(path, shape.describe(), kind_of(value))
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "record",
    }
}

/// Check `value` against `shape`, coercing obviously equivalent primitives.
///
/// Numeric strings become numbers, `"true"`/`"false"` become booleans, and
/// numbers or booleans become strings where a string is expected. Records keep
/// only declared fields; optional fields that are null are dropped. Missing
/// required fields are an error and are never filled in.
pub fn conform(value: Value, shape: &Shape) -> Result<Value, SchemaViolation> {
    conform_at(value, shape, "$")
}

fn conform_at(value: Value, shape: &Shape, path: &str) -> Result<Value, SchemaViolation> {
    match shape {
        Shape::Text => match value {
            Value::String(text) if !text.trim().is_empty() => Ok(Value::String(text)),
            Value::String(_) => Err(SchemaViolation::new(path, "text", "empty string")),
            other => Err(SchemaViolation::mismatch(path, shape, &other)),
        },
        Shape::String => match value {
            Value::String(text) => Ok(Value::String(text)),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(SchemaViolation::mismatch(path, shape, &other)),
        },
        Shape::Integer => coerce_integer(&value)
            .map(|n| Value::Number(n.into()))
            .ok_or_else(|| SchemaViolation::mismatch(path, shape, &value)),
        Shape::Number => match &value {
            Value::Number(_) => Ok(value),
            Value::String(text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| SchemaViolation::new(path, "number", "non-numeric string")),
            other => Err(SchemaViolation::mismatch(path, shape, other)),
        },
        Shape::Boolean => match &value {
            Value::Bool(_) => Ok(value),
            Value::String(text) if text.trim().eq_ignore_ascii_case("true") => {
                Ok(Value::Bool(true))
            }
            Value::String(text) if text.trim().eq_ignore_ascii_case("false") => {
                Ok(Value::Bool(false))
            }
            other => Err(SchemaViolation::mismatch(path, shape, other)),
        },
        Shape::List { items, min_items } => match value {
            Value::Array(values) => {
                if values.len() < *min_items {
                    return Err(SchemaViolation::new(
                        path,
                        format!("at least {} items", min_items),
                        format!("{} items", values.len()),
                    ));
                }
                values
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| conform_at(item, items, &format!("{}[{}]", path, i)))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            other => Err(SchemaViolation::mismatch(path, shape, &other)),
        },
        Shape::Record { fields } => match value {
            Value::Object(mut object) => {
                let mut conformed = Map::new();
                for field in fields {
                    let field_path = format!("{}.{}", path, field.name);
                    match object.remove(&field.name) {
                        None | Some(Value::Null) if field.required => {
                            return Err(SchemaViolation::new(
                                &field_path,
                                field.shape.describe(),
                                "nothing",
                            ));
                        }
                        None | Some(Value::Null) => {}
                        Some(member) => {
                            let member = conform_at(member, &field.shape, &field_path)?;
                            conformed.insert(field.name.clone(), member);
                        }
                    }
                }
                Ok(Value::Object(conformed))
            }
            other => Err(SchemaViolation::mismatch(path, shape, &other)),
        },
    }
}

fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(whole)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(whole))
        }
        _ => None,
    }
}

fn whole(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}
