//! JobSphere Core Library
//!
//! Orchestration engine for unreliable external sources: AI text-generation
//! providers are tried in priority order with fallback, job boards are
//! queried concurrently and their listings merged, and every free-form
//! response is normalized into the shape the caller asked for.
//!
//! ```no_run
//! # async fn demo() -> Result<(), jobsphere_core::EngineError> {
//! use jobsphere_core::{config, prompts, Orchestrator};
//!
//! let engine = Orchestrator::from_config(&config::from_env())?;
//! let result = engine
//!     .orchestrate(&prompts::cover_letter("resume text", "job text", "professional"))
//!     .await;
//! let letter = result.parse_data::<jobsphere_core::protocol::CoverLetter>();
//! if let Some(letter) = letter.ok().flatten() {
//!     println!("{}", letter.cover_letter);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod http;
pub mod normalize;
pub mod orchestrator;
pub mod prompts;
pub mod protocol;
pub mod providers;

pub use normalize::{ExpectedSchema, NormalizationError, Normalizer};
pub use orchestrator::{EngineError, Orchestrator, OrchestratorBuilder, ResultMerger};
pub use protocol::{
    Attempt, AttemptLog, AttemptOutcome, FailureReason, OrchestrationResult, OrchestrationStatus,
    Strategy, TaskDescriptor, TaskType,
};
pub use providers::{ProviderDescriptor, ProviderKind, QuotaTracker};

/// Returns the version of the JobSphere Core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
