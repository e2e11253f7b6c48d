//! AI explanation of lab results.
//!
//! One prompt per test result is sent to a text-completion service, all
//! prompts at once. The batch is all-or-nothing: a single failed call fails
//! the analysis and nothing is persisted. No retries; the caller re-triggers.

pub mod orchestrator;
pub mod prompt;
pub mod sonar;

#[cfg(test)]
pub mod mock;

pub use orchestrator::*;
pub use prompt::*;
pub use sonar::*;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Completion service unreachable at {0}")]
    Connection(String),

    #[error("Completion service returned error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Report has no test results to analyze")]
    NoTestResults,

    #[error("Completion task failed: {0}")]
    TaskFailed(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// A text-completion backend: one prompt in, one text out.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, AnalysisError>;

    /// Human-readable backend name for logs.
    fn name(&self) -> &str;
}
