//! Values crossing the engine boundary
//!
//! Callers describe work with a [`TaskDescriptor`] and get back an
//! [`OrchestrationResult`] carrying the normalized data and the
//! [`AttemptLog`] of every provider call made on their behalf.

pub mod types;

pub use types::{
    Attempt, AttemptLog, AttemptOutcome, CompanyResearch, CoverLetter, DatePosted, FailureReason,
    InterviewQuestions, JobItem, JobMatch, JobQuery, OrchestrationResult, OrchestrationStatus,
    PromptPayload, ResumeProfile, SortOrder, Strategy, TaskDescriptor, TaskPayload, TaskType,
    DEFAULT_DEADLINE,
};
