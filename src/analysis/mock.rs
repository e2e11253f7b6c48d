//! Scripted completion client for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{AnalysisError, CompletionClient};

/// Answers `"answer: <prompt>"`. Prompts containing `fail_marker` fail
/// immediately with a 500; everything else succeeds after `delay`.
pub struct MockCompletionClient {
    fail_marker: Option<String>,
    delay: Duration,
    pub started: AtomicUsize,
    pub completed: AtomicUsize,
}

impl MockCompletionClient {
    pub fn new() -> Self {
        Self {
            fail_marker: None,
            delay: Duration::ZERO,
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

impl Default for MockCompletionClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, AnalysisError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.fail_marker {
            if prompt.contains(marker.as_str()) {
                return Err(AnalysisError::Upstream {
                    status: 500,
                    body: "mock failure".into(),
                });
            }
        }
        tokio::time::sleep(self.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(format!("answer: {prompt}"))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
