//! Fan-out of analysis prompts and persistence of the joined result.

use std::sync::Arc;

use futures_util::future::try_join_all;
use serde::Serialize;

use super::prompt::{build_prompts, default_recommendations};
use super::{AnalysisError, CompletionClient};
use crate::db::{DatabaseError, ReportStore};
use crate::models::{AnalysisDraft, ReportAnalysis};
use crate::range::abnormal_results;

/// Separator between per-prompt answers in the joined summary.
pub const SUMMARY_SEPARATOR: &str = "\n\n";

/// Joined output of one successful batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub analysis_summary: String,
    pub recommendations: Vec<String>,
}

pub struct AnalysisOrchestrator {
    client: Arc<dyn CompletionClient>,
}

impl AnalysisOrchestrator {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    /// Dispatch every prompt concurrently and join in prompt order.
    ///
    /// Each prompt runs in its own task. The first failure fails the batch;
    /// tasks already in flight are left to finish and their output is dropped.
    pub async fn run_batch(&self, prompts: Vec<String>) -> Result<BatchOutcome, AnalysisError> {
        let total = prompts.len();
        tracing::info!(prompts = total, backend = self.client.name(), "Dispatching analysis batch");

        let handles: Vec<_> = prompts
            .into_iter()
            .map(|prompt| {
                let client = Arc::clone(&self.client);
                tokio::spawn(async move { client.complete(&prompt).await })
            })
            .collect();

        let texts = try_join_all(handles.into_iter().enumerate().map(|(index, handle)| async move {
            match handle.await {
                Ok(Ok(text)) => Ok(text),
                Ok(Err(e)) => {
                    tracing::warn!(index, error = %e, "Completion failed, discarding batch");
                    Err(e)
                }
                Err(e) => Err(AnalysisError::TaskFailed(e.to_string())),
            }
        }))
        .await?;

        tracing::info!(prompts = total, "Analysis batch complete");
        Ok(BatchOutcome {
            analysis_summary: texts.join(SUMMARY_SEPARATOR),
            recommendations: default_recommendations(),
        })
    }

    /// Load a report, analyze its current test results and attach the
    /// result.
    ///
    /// Nothing is written unless every completion succeeded. The store
    /// assigns `created_at`.
    pub async fn analyze_report(
        &self,
        store: &dyn ReportStore,
        report_id: &str,
    ) -> Result<ReportAnalysis, AnalysisError> {
        let report = store
            .get(report_id)?
            .ok_or_else(|| DatabaseError::report_not_found(report_id))?;
        let results = &report.content.test_results;
        if results.is_empty() {
            return Err(AnalysisError::NoTestResults);
        }

        let outcome = self.run_batch(build_prompts(results)).await?;
        let draft = AnalysisDraft {
            summary: outcome.analysis_summary,
            abnormal_results: abnormal_results(results),
            recommendations: Some(outcome.recommendations),
        };

        let analysis = store.set_analysis(&report.id, draft)?;
        tracing::info!(report_id = %report.id, "Report analysis saved");
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::analysis::mock::MockCompletionClient;
    use crate::db::SqliteReportStore;
    use crate::models::{NewReport, Report, ReportContent, TestResult};

    fn orchestrator(client: MockCompletionClient) -> (AnalysisOrchestrator, Arc<MockCompletionClient>) {
        let client = Arc::new(client);
        (AnalysisOrchestrator::new(client.clone()), client)
    }

    fn stored_report(store: &SqliteReportStore, results: Vec<TestResult>) -> Report {
        let id = store
            .create(
                "alice",
                NewReport {
                    title: "Panel".into(),
                    content: ReportContent {
                        test_results: results,
                        ..ReportContent::default()
                    },
                    is_public: false,
                },
            )
            .unwrap();
        store.get(&id).unwrap().unwrap()
    }

    #[tokio::test]
    async fn batch_joins_in_prompt_order() {
        let (orch, _) = orchestrator(MockCompletionClient::new());
        let outcome = orch
            .run_batch(vec!["one".into(), "two".into(), "three".into()])
            .await
            .unwrap();
        assert_eq!(
            outcome.analysis_summary,
            "answer: one\n\nanswer: two\n\nanswer: three"
        );
        assert_eq!(outcome.recommendations, default_recommendations());
    }

    #[tokio::test]
    async fn empty_batch_yields_empty_summary() {
        let (orch, client) = orchestrator(MockCompletionClient::new());
        let outcome = orch.run_batch(vec![]).await.unwrap();
        assert_eq!(outcome.analysis_summary, "");
        assert_eq!(client.started(), 0);
    }

    #[tokio::test]
    async fn prompts_run_concurrently() {
        let delay = Duration::from_millis(200);
        let (orch, _) = orchestrator(MockCompletionClient::new().with_delay(delay));
        let prompts: Vec<String> = (0..5).map(|i| format!("p{i}")).collect();

        let start = std::time::Instant::now();
        orch.run_batch(prompts).await.unwrap();
        // Sequential dispatch would take five delays.
        assert!(start.elapsed() < delay * 3, "took {:?}", start.elapsed());
    }

    #[tokio::test]
    async fn single_failure_fails_batch() {
        let (orch, _) = orchestrator(MockCompletionClient::new().failing_on("bad"));
        let err = orch
            .run_batch(vec!["ok".into(), "bad".into(), "ok too".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Upstream { status: 500, .. }));
    }

    #[tokio::test]
    async fn in_flight_siblings_finish_after_failure() {
        let (orch, client) = orchestrator(
            MockCompletionClient::new()
                .failing_on("bad")
                .with_delay(Duration::from_millis(100)),
        );
        let result = orch
            .run_batch(vec!["slow a".into(), "bad".into(), "slow b".into()])
            .await;
        assert!(result.is_err());
        // The failure returns before the slow calls complete...
        assert_eq!(client.completed(), 0);
        // ...but they were not cancelled.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(client.completed(), 2);
    }

    #[tokio::test]
    async fn analyze_report_persists_summary_and_abnormal_results() {
        let store = SqliteReportStore::open_in_memory().unwrap();
        let report = stored_report(
            &store,
            vec![
                TestResult::new("Hemoglobin", 16.0).with_unit("g/dL").with_range("12.0-15.5"),
                TestResult::new("Glucose", 90.0).with_range("70-100"),
            ],
        );
        let (orch, client) = orchestrator(MockCompletionClient::new());

        let analysis = orch.analyze_report(&store, &report.id).await.unwrap();
        assert_eq!(client.started(), 2);
        assert!(analysis.summary.contains("Hemoglobin value of 16 g/dL"));
        assert!(analysis.summary.contains("\n\nanswer: Explain what a Glucose"));
        assert_eq!(analysis.abnormal_results.len(), 1);
        assert_eq!(analysis.abnormal_results[0].name, "Hemoglobin");
        assert_eq!(analysis.recommendations.as_ref().unwrap().len(), 3);

        let stored = store.get(&report.id).unwrap().unwrap();
        assert_eq!(stored.analysis, Some(analysis));
    }

    #[tokio::test]
    async fn failed_batch_leaves_analysis_absent() {
        let store = SqliteReportStore::open_in_memory().unwrap();
        let report = stored_report(
            &store,
            vec![
                TestResult::new("Hemoglobin", 16.0),
                TestResult::new("Ferritin", 5.0),
                TestResult::new("Glucose", 90.0),
            ],
        );
        let (orch, _) = orchestrator(MockCompletionClient::new().failing_on("Ferritin"));

        assert!(orch.analyze_report(&store, &report.id).await.is_err());
        assert!(store.get(&report.id).unwrap().unwrap().analysis.is_none());
    }

    #[tokio::test]
    async fn failed_reanalysis_keeps_previous_analysis() {
        let store = SqliteReportStore::open_in_memory().unwrap();
        let report = stored_report(&store, vec![TestResult::new("Ferritin", 5.0)]);

        let (ok, _) = orchestrator(MockCompletionClient::new());
        let first = ok.analyze_report(&store, &report.id).await.unwrap();

        let (failing, _) = orchestrator(MockCompletionClient::new().failing_on("Ferritin"));
        assert!(failing.analyze_report(&store, &report.id).await.is_err());
        assert_eq!(store.get(&report.id).unwrap().unwrap().analysis, Some(first));
    }

    #[tokio::test]
    async fn unknown_report_is_not_found() {
        let store = SqliteReportStore::open_in_memory().unwrap();
        let (orch, client) = orchestrator(MockCompletionClient::new());

        let err = orch.analyze_report(&store, "no-such-id").await.unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Database(DatabaseError::NotFound { .. })
        ));
        assert_eq!(client.started(), 0);
    }

    #[tokio::test]
    async fn report_without_results_is_rejected_before_dispatch() {
        let store = SqliteReportStore::open_in_memory().unwrap();
        let report = stored_report(&store, vec![]);
        let (orch, client) = orchestrator(MockCompletionClient::new());

        let err = orch.analyze_report(&store, &report.id).await.unwrap_err();
        assert!(matches!(err, AnalysisError::NoTestResults));
        assert_eq!(client.started(), 0);
    }
}
