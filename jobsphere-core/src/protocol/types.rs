//! Task, attempt and result types exchanged with the orchestration engine

use crate::normalize::ExpectedSchema;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Default overall budget of one orchestration run
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(60);

/// Kind of work requested from external providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    GenerateQuestions,
    GenerateAnswer,
    GenerateCoverLetter,
    AnalyzeResume,
    GenerateResume,
    MatchJobs,
    SearchJobs,
    ResearchCompany,
    SuggestSkills,
}

impl TaskType {
    /// Every task type, in declaration order
    pub const ALL: [TaskType; 9] = [
        TaskType::GenerateQuestions,
        TaskType::GenerateAnswer,
        TaskType::GenerateCoverLetter,
        TaskType::AnalyzeResume,
        TaskType::GenerateResume,
        TaskType::MatchJobs,
        TaskType::SearchJobs,
        TaskType::ResearchCompany,
        TaskType::SuggestSkills,
    ];

    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::GenerateQuestions => "generate_questions",
            TaskType::GenerateAnswer => "generate_answer",
            TaskType::GenerateCoverLetter => "generate_cover_letter",
            TaskType::AnalyzeResume => "analyze_resume",
            TaskType::GenerateResume => "generate_resume",
            TaskType::MatchJobs => "match_jobs",
            TaskType::SearchJobs => "search_jobs",
            TaskType::ResearchCompany => "research_company",
            TaskType::SuggestSkills => "suggest_skills",
        }
    }

    /// Whether the task is answered by job boards rather than text generation
    pub fn is_job_search(&self) -> bool {
        matches!(self, TaskType::SearchJobs)
    }

    /// Strategy used when the caller does not pick one
    pub fn default_strategy(&self) -> Strategy {
        if self.is_job_search() {
            Strategy::Fanout
        } else {
            Strategy::Cascade
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How providers are driven for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Sequential fallback in priority order until one provider succeeds
    #[default]
    Cascade,
    /// Concurrent query of every eligible provider, results merged
    Fanout,
}

/// Text generation input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptPayload {
    /// Optional system instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// The user prompt
    pub prompt: String,

    /// Upper bound on generated tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl PromptPayload {
    /// A prompt with default sampling settings
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }

    /// Set the system instruction
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the generation limit
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.7
}

/// Job board search input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobQuery {
    /// Free-text keywords, usually a role title
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// ISO country code used by boards that partition by country
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(default)]
    pub remote_only: bool,

    /// Results requested from each board
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Employment type filter as the boards spell it, e.g. `FULLTIME`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_posted: Option<DatePosted>,

    /// Yearly salary bounds, in the board's currency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_min: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_max: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortOrder>,
}

impl JobQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            location: None,
            country: None,
            remote_only: false,
            limit: default_limit(),
            job_type: None,
            date_posted: None,
            salary_min: None,
            salary_max: None,
            sort_by: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn remote_only(mut self, remote_only: bool) -> Self {
        self.remote_only = remote_only;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_job_type(mut self, job_type: impl Into<String>) -> Self {
        self.job_type = Some(job_type.into());
        self
    }

    pub fn posted_within(mut self, window: DatePosted) -> Self {
        self.date_posted = Some(window);
        self
    }

    /// Bound the advertised salary; either side may be open
    pub fn with_salary(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.salary_min = min;
        self.salary_max = max;
        self
    }

    pub fn sorted_by(mut self, order: SortOrder) -> Self {
        self.sort_by = Some(order);
        self
    }

    /// Location to send to a board, or `None` when it only says "remote"
    pub fn place(&self) -> Option<&str> {
        self.location
            .as_deref()
            .filter(|location| !location.trim().eq_ignore_ascii_case("remote"))
    }
}

/// How recent a posting must be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePosted {
    Today,
    #[serde(rename = "3days")]
    ThreeDays,
    Week,
    Month,
}

impl DatePosted {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatePosted::Today => "today",
            DatePosted::ThreeDays => "3days",
            DatePosted::Week => "week",
            DatePosted::Month => "month",
        }
    }

    pub fn max_days_old(&self) -> u32 {
        match self {
            DatePosted::Today => 1,
            DatePosted::ThreeDays => 3,
            DatePosted::Week => 7,
            DatePosted::Month => 31,
        }
    }
}

/// Result ordering requested from the boards that support it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Date,
    Relevance,
    /// Adzuna only
    Salary,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Date => "date",
            SortOrder::Relevance => "relevance",
            SortOrder::Salary => "salary",
        }
    }
}

fn default_limit() -> usize {
    20
}

/// Prompt or query carried by a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    Prompt(PromptPayload),
    JobQuery(JobQuery),
}

/// One unit of work handed to the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub task_type: TaskType,

    pub payload: TaskPayload,

    /// Shape the caller needs back
    pub expected_schema: ExpectedSchema,

    pub strategy: Strategy,

    /// Wall-clock budget for the whole run, not per attempt
    pub deadline: Duration,

    /// Cap on merged items for job searches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
}

impl TaskDescriptor {
    /// A task with the task type's default schema and strategy
    pub fn new(task_type: TaskType, payload: TaskPayload) -> Self {
        Self {
            task_type,
            payload,
            expected_schema: ExpectedSchema::for_task(task_type),
            strategy: task_type.default_strategy(),
            deadline: DEFAULT_DEADLINE,
            max_results: None,
        }
    }

    /// A text generation task
    pub fn prompt(task_type: TaskType, prompt: PromptPayload) -> Self {
        Self::new(task_type, TaskPayload::Prompt(prompt))
    }

    /// A job search task
    pub fn job_search(query: JobQuery) -> Self {
        Self::new(TaskType::SearchJobs, TaskPayload::JobQuery(query))
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_schema(mut self, schema: ExpectedSchema) -> Self {
        self.expected_schema = schema;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// The prompt, if this is a text generation task
    pub fn prompt_payload(&self) -> Option<&PromptPayload> {
        match &self.payload {
            TaskPayload::Prompt(prompt) => Some(prompt),
            TaskPayload::JobQuery(_) => None,
        }
    }

    /// The query, if this is a job search task
    pub fn job_query(&self) -> Option<&JobQuery> {
        match &self.payload {
            TaskPayload::JobQuery(query) => Some(query),
            TaskPayload::Prompt(_) => None,
        }
    }
}

/// Classified outcome of one provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Timeout,
    AuthError,
    RateLimited,
    MalformedResponse,
    TransportError,
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success)
    }

    /// Transient failures qualify for a same-provider re-attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AttemptOutcome::Timeout | AttemptOutcome::RateLimited | AttemptOutcome::TransportError
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Timeout => "timeout",
            AttemptOutcome::AuthError => "auth_error",
            AttemptOutcome::RateLimited => "rate_limited",
            AttemptOutcome::MalformedResponse => "malformed_response",
            AttemptOutcome::TransportError => "transport_error",
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of one provider call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub provider_id: String,

    /// Which of the provider's credentials was used
    pub credential_index: usize,

    /// Correlates the attempt with transport logs
    pub request_id: Uuid,

    pub started_at: DateTime<Utc>,

    pub duration_ms: u64,

    pub outcome: AttemptOutcome,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,

    /// Provider-declared retry hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,

    /// Response body, redacted of credentials and truncated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_payload: Option<String>,

    /// Human-readable failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Attempt {
    /// An attempt that has just started, with no outcome details yet
    pub fn begin(provider_id: impl Into<String>, credential_index: usize) -> Self {
        Self {
            provider_id: provider_id.into(),
            credential_index,
            request_id: Uuid::new_v4(),
            started_at: Utc::now(),
            duration_ms: 0,
            outcome: AttemptOutcome::Success,
            http_status: None,
            retry_after_ms: None,
            raw_payload: None,
            detail: None,
        }
    }

    /// Retry hint as a duration
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after_ms.map(Duration::from_millis)
    }
}

/// Append-only list of attempts of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptLog {
    attempts: Vec<Attempt>,
}

impl AttemptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attempt
    pub fn push(&mut self, attempt: Attempt) {
        self.attempts.push(attempt);
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attempt> {
        self.attempts.iter()
    }

    pub fn as_slice(&self) -> &[Attempt] {
        &self.attempts
    }

    /// Attempts made against one provider
    pub fn for_provider<'a>(&'a self, provider_id: &'a str) -> impl Iterator<Item = &'a Attempt> {
        self.attempts
            .iter()
            .filter(move |attempt| attempt.provider_id == provider_id)
    }

    /// Order attempts by start time, keeping insertion order for ties
    pub(crate) fn sort_by_start(&mut self) {
        self.attempts.sort_by_key(|attempt| attempt.started_at);
    }
}

impl<'a> IntoIterator for &'a AttemptLog {
    type Item = &'a Attempt;
    type IntoIter = std::slice::Iter<'a, Attempt>;

    fn into_iter(self) -> Self::IntoIter {
        self.attempts.iter()
    }
}

/// Overall status of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationStatus {
    Success,
    /// Some sources contributed while others failed. Reserved for callers that
    /// grade merged results; the engine reports any contribution as `Success`.
    PartialSuccess,
    Failure,
}

/// Why a run produced no data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// No provider declares the task type
    NoProviderConfigured,
    /// Providers exist but every credential is cooling down
    NoEligibleProvider,
    /// Every eligible provider was tried without success
    Exhausted,
    /// The run deadline expired
    DeadlineExceeded,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureReason::NoProviderConfigured => "no provider configured for this task",
            FailureReason::NoEligibleProvider => "every provider for this task is cooling down",
            FailureReason::Exhausted => "all eligible providers failed",
            FailureReason::DeadlineExceeded => "deadline exceeded",
        };
        f.write_str(text)
    }
}

/// Outcome of `Orchestrator::orchestrate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub run_id: Uuid,

    pub task_type: TaskType,

    pub status: OrchestrationStatus,

    /// Normalized or merged payload; absent on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Providers that contributed to `data`
    pub served_by: Vec<String>,

    pub attempts: AttemptLog,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,

    pub elapsed_ms: u64,
}

impl OrchestrationResult {
    pub fn is_success(&self) -> bool {
        self.status == OrchestrationStatus::Success
    }

    /// Deserialize the payload into a typed output
    pub fn parse_data<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        self.data.clone().map(serde_json::from_value).transpose()
    }
}

/// Canonical job posting produced by job board providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobItem {
    pub title: String,

    pub company: String,

    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Providers that returned this posting, first one is the origin
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

impl JobItem {
    pub fn new(
        title: impl Into<String>,
        company: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            company: company.into(),
            url: url.into(),
            id: None,
            location: None,
            salary: None,
            description: None,
            job_type: None,
            posted_date: None,
            remote: None,
            tags: Vec::new(),
            sources: Vec::new(),
        }
    }
}

/// Interview questions grouped by category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewQuestions {
    pub technical: Vec<String>,
    pub behavioral: Vec<String>,
    #[serde(default)]
    pub company: Vec<String>,
    #[serde(default)]
    pub general: Vec<String>,
}

/// Generated cover letter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverLetter {
    pub cover_letter: String,
}

/// Structured profile extracted from a resume
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeProfile {
    pub skills: Vec<String>,
    pub experience_years: i64,
    pub job_titles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_preference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
    #[serde(default)]
    pub certifications: Vec<String>,
}

/// Fit between a candidate profile and one job posting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMatch {
    pub score: f64,
    pub matching_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
}

/// Company research used to tailor a resume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyResearch {
    pub company_type: String,
    pub culture_keywords: Vec<String>,
    pub recommended_template: String,
    #[serde(default)]
    pub accepted_templates: Vec<String>,
    #[serde(default)]
    pub resume_format_tips: Vec<String>,
    #[serde(default)]
    pub key_skills_to_highlight: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_reasoning: Option<String>,
}
