//! Provider kinds and descriptors
//!
//! Every backend the engine can talk to is a [`ProviderKind`] variant. The
//! kind knows how to turn a task into an HTTP request and how to pull the
//! payload out of the response envelope; the [`ProviderDescriptor`] carries
//! the static configuration of one configured instance.

use super::error::{ProviderError, ProviderResult};
use super::{jobs, text};
use crate::config::{ProviderConfig, SecretString};
use crate::http::ProviderRequest;
use crate::normalize::Payload;
use crate::protocol::{TaskDescriptor, TaskPayload, TaskType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Default per-call timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default priority when none is configured
pub const DEFAULT_PRIORITY: i32 = 100;

/// Closed set of supported backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    OpenRouter,
    Groq,
    Xai,
    Cohere,
    HuggingFace,
    Adzuna,
    Remotive,
    TheMuse,
    JSearch,
    Arbeitnow,
}

const AI_QUOTA_MARKERS: &[&str] = &[
    "resource_exhausted",
    "resourceexhausted",
    "quota",
    "rate limit",
    "rate_limit",
    "too many requests",
];

const BOARD_QUOTA_MARKERS: &[&str] = &["rate limit", "too many requests", "quota"];

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::Groq => "groq",
            ProviderKind::Xai => "xai",
            ProviderKind::Cohere => "cohere",
            ProviderKind::HuggingFace => "huggingface",
            ProviderKind::Adzuna => "adzuna",
            ProviderKind::Remotive => "remotive",
            ProviderKind::TheMuse => "themuse",
            ProviderKind::JSearch => "jsearch",
            ProviderKind::Arbeitnow => "arbeitnow",
        }
    }

    /// Whether this kind searches job boards rather than generating text
    pub fn is_job_board(&self) -> bool {
        matches!(
            self,
            ProviderKind::Adzuna
                | ProviderKind::Remotive
                | ProviderKind::TheMuse
                | ProviderKind::JSearch
                | ProviderKind::Arbeitnow
        )
    }

    /// Whether the kind can serve a task type at all
    pub fn supports(&self, task: TaskType) -> bool {
        self.is_job_board() == task.is_job_search()
    }

    /// Whether calls need a credential
    pub fn requires_credential(&self) -> bool {
        !matches!(
            self,
            ProviderKind::Remotive | ProviderKind::TheMuse | ProviderKind::Arbeitnow
        )
    }

    /// Public endpoint used when the configuration gives none
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta/models",
            ProviderKind::OpenAi => "https://api.openai.com/v1/chat/completions",
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1/chat/completions",
            ProviderKind::Groq => "https://api.groq.com/openai/v1/chat/completions",
            ProviderKind::Xai => "https://api.x.ai/v1/chat/completions",
            ProviderKind::Cohere => "https://api.cohere.ai/v1/chat",
            ProviderKind::HuggingFace => "https://api-inference.huggingface.co/models",
            ProviderKind::Adzuna => "https://api.adzuna.com/v1/api/jobs",
            ProviderKind::Remotive => "https://remotive.com/api/remote-jobs",
            ProviderKind::TheMuse => "https://www.themuse.com/api/public/jobs",
            ProviderKind::JSearch => "https://jsearch.p.rapidapi.com/search",
            ProviderKind::Arbeitnow => "https://www.arbeitnow.com/api/job-board-api",
        }
    }

    /// Model used when the configuration gives none
    pub fn default_model(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Gemini => Some("gemini-1.5-flash"),
            ProviderKind::OpenAi => Some("gpt-4o-mini"),
            ProviderKind::OpenRouter => Some("meta-llama/llama-3-8b-instruct"),
            ProviderKind::Groq => Some("llama3-70b-8192"),
            ProviderKind::Xai => Some("grok-beta"),
            ProviderKind::Cohere => Some("command-r"),
            ProviderKind::HuggingFace => Some("mistralai/Mistral-7B-Instruct-v0.2"),
            _ => None,
        }
    }

    /// Lowercase body fragments that mean the quota is exhausted
    pub fn quota_markers(&self) -> &'static [&'static str] {
        if self.is_job_board() {
            BOARD_QUOTA_MARKERS
        } else {
            AI_QUOTA_MARKERS
        }
    }

    /// Build the HTTP request for one task
    pub fn build_request(
        &self,
        provider: &ProviderDescriptor,
        credential: Option<&SecretString>,
        task: &TaskDescriptor,
        request_id: Uuid,
        timeout: Duration,
    ) -> ProviderResult<ProviderRequest> {
        if !self.supports(task.task_type) {
            return Err(ProviderError::Unsupported {
                provider: provider.id.clone(),
                task: task.task_type,
            });
        }
        if self.requires_credential() && credential.is_none() {
            return Err(ProviderError::MissingCredential {
                provider: provider.id.clone(),
            });
        }

        let base = ProviderRequest::new(
            provider.id.clone(),
            request_id,
            crate::http::HttpMethod::Get,
            provider.endpoint.clone(),
            timeout,
        );

        match &task.payload {
            TaskPayload::Prompt(prompt) if !self.is_job_board() => {
                text::build_request(*self, provider, credential, prompt, base)
            }
            TaskPayload::JobQuery(query) if self.is_job_board() => {
                jobs::build_request(*self, credential, query, base)
            }
            _ => Err(ProviderError::InvalidPayload {
                provider: provider.id.clone(),
                message: format!("{} cannot use this payload", self),
            }),
        }
    }

    /// Pull the payload out of a successful response body
    pub fn extract(&self, task: &TaskDescriptor, body: &str) -> ProviderResult<Payload> {
        if self.is_job_board() {
            jobs::extract(*self, task.job_query(), body).map(Payload::Structured)
        } else {
            text::extract(*self, body).map(Payload::Text)
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static configuration of one provider instance, immutable once built
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    pub id: String,
    pub kind: ProviderKind,
    pub endpoint: String,
    pub model: Option<String>,
    /// Rotated round-robin
    pub credentials: Vec<SecretString>,
    pub capabilities: BTreeSet<TaskType>,
    /// Priority for all tasks (lower = tried first)
    pub priority: i32,
    pub task_priority: BTreeMap<TaskType, i32>,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl ProviderDescriptor {
    /// Descriptor with the kind's defaults, serving every task the kind supports
    pub fn new(id: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            id: id.into(),
            kind,
            endpoint: kind.default_endpoint().to_string(),
            model: kind.default_model().map(str::to_string),
            credentials: Vec::new(),
            capabilities: TaskType::ALL
                .iter()
                .copied()
                .filter(|task| kind.supports(*task))
                .collect(),
            priority: DEFAULT_PRIORITY,
            task_priority: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: 1,
        }
    }

    /// Build from configuration
    pub fn from_config(config: &ProviderConfig) -> Self {
        let mut descriptor = Self::new(config.id.clone(), config.kind);
        if let Some(endpoint) = &config.endpoint {
            descriptor.endpoint = endpoint.trim_end_matches('/').to_string();
        }
        if let Some(model) = &config.model {
            descriptor.model = Some(model.clone());
        }
        if !config.tasks.is_empty() {
            descriptor.capabilities = config.tasks.iter().copied().collect();
        }
        descriptor.credentials = config.credentials.clone();
        descriptor.priority = config.priority;
        descriptor.task_priority = config.task_priority.clone();
        descriptor.timeout = Duration::from_millis(config.timeout_ms);
        descriptor.max_retries = config.max_retries;
        descriptor
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_credential(mut self, credential: impl Into<SecretString>) -> Self {
        self.credentials.push(credential.into());
        self
    }

    /// Restrict the task types served
    pub fn with_tasks(mut self, tasks: impl IntoIterator<Item = TaskType>) -> Self {
        self.capabilities = tasks.into_iter().collect();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_task_priority(mut self, task: TaskType, priority: i32) -> Self {
        self.task_priority.insert(task, priority);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Whether this provider is configured for the task type
    pub fn can_serve(&self, task: TaskType) -> bool {
        self.capabilities.contains(&task) && self.kind.supports(task)
    }

    /// Priority for a task, falling back to the provider-wide value
    pub fn priority_for(&self, task: TaskType) -> i32 {
        self.task_priority
            .get(&task)
            .copied()
            .unwrap_or(self.priority)
    }

    /// Number of round-robin slots; key-less providers have one implicit slot
    pub fn credential_slots(&self) -> usize {
        self.credentials.len().max(1)
    }

    pub fn credential(&self, index: usize) -> Option<&SecretString> {
        self.credentials.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{JobQuery, PromptPayload};

    #[test]
    fn test_capabilities_follow_kind() {
        let gemini = ProviderDescriptor::new("gemini", ProviderKind::Gemini);
        assert!(gemini.can_serve(TaskType::GenerateCoverLetter));
        assert!(!gemini.can_serve(TaskType::SearchJobs));

        let remotive = ProviderDescriptor::new("remotive", ProviderKind::Remotive);
        assert!(remotive.can_serve(TaskType::SearchJobs));
        assert!(!remotive.can_serve(TaskType::GenerateAnswer));
        assert_eq!(remotive.credential_slots(), 1);
    }

    #[test]
    fn test_task_priority_override() {
        let provider = ProviderDescriptor::new("groq", ProviderKind::Groq)
            .with_priority(3)
            .with_task_priority(TaskType::GenerateQuestions, 1);
        assert_eq!(provider.priority_for(TaskType::GenerateQuestions), 1);
        assert_eq!(provider.priority_for(TaskType::GenerateAnswer), 3);
    }

    #[test]
    fn test_from_config() {
        let mut config = ProviderConfig::new("openrouter", ProviderKind::OpenRouter);
        config.endpoint = Some("http://localhost:9000/chat/".to_string());
        config.credentials = vec![SecretString::new("sk-or-1")];
        config.tasks = vec![TaskType::GenerateCoverLetter];
        config.timeout_ms = 1500;

        let descriptor = ProviderDescriptor::from_config(&config);
        assert_eq!(descriptor.endpoint, "http://localhost:9000/chat");
        assert_eq!(descriptor.timeout, Duration::from_millis(1500));
        assert!(descriptor.can_serve(TaskType::GenerateCoverLetter));
        assert!(!descriptor.can_serve(TaskType::GenerateAnswer));
        assert_eq!(descriptor.model.as_deref(), Some("meta-llama/llama-3-8b-instruct"));
    }

    #[test]
    fn test_payload_must_match_kind() {
        let provider =
            ProviderDescriptor::new("gemini", ProviderKind::Gemini).with_credential("k-123456");
        let task = TaskDescriptor::job_search(JobQuery::new("rust"))
            .with_schema(crate::normalize::ExpectedSchema::job_list());
        let err = provider
            .kind
            .build_request(
                &provider,
                provider.credential(0),
                &task,
                Uuid::new_v4(),
                DEFAULT_TIMEOUT,
            )
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported { .. }));

        let task = TaskDescriptor::prompt(TaskType::GenerateAnswer, PromptPayload::new("hi"));
        let err = provider
            .kind
            .build_request(&provider, None, &task, Uuid::new_v4(), DEFAULT_TIMEOUT)
            .unwrap_err();
        assert!(matches!(err, ProviderError::MissingCredential { .. }));
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_value(ProviderKind::OpenAi).unwrap(), "openai");
        assert_eq!(serde_json::to_value(ProviderKind::TheMuse).unwrap(), "themuse");
        assert_eq!(ProviderKind::HuggingFace.to_string(), "huggingface");
    }
}
