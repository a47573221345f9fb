mod jobs;
mod outcome;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use ci_analyzer_db::{AnalysisRepository, PredictionRepository};
use ci_analyzer_inference::{RiskScorer, RootCauseAnalyzer};
pub use jobs::{
    PullRequestRiskJob, WorkflowFailureJob, process_pull_request_risk, process_workflow_failure,
};
pub use outcome::{DropReason, Dropped, OutcomeSnapshot, OutcomeStats, PipelineOutcome, SkipReason};

/// Shared context available to both pipelines. The GitHub client is passed to each
/// pipeline separately, since webhook events are refused without one.
#[derive(Clone)]
pub struct JobContext {
    pub analyzer: RootCauseAnalyzer,
    pub scorer: Arc<dyn RiskScorer>,
    pub analyses: Arc<dyn AnalysisRepository>,
    pub predictions: Arc<dyn PredictionRepository>,
    pub stats: Arc<OutcomeStats>,
}

impl JobContext {
    fn finish(&self, subject: &str, outcome: PipelineOutcome) -> PipelineOutcome {
        match &outcome {
            PipelineOutcome::Recorded { id } => {
                tracing::info!("Saved record {} for {}", id, subject);
            }
            PipelineOutcome::Skipped(reason) => {
                tracing::info!(reason = %reason, "Skipped {}", subject);
            }
            PipelineOutcome::Dropped(dropped) => {
                tracing::error!(
                    reason = %dropped.reason,
                    "Dropped {}: {:#}",
                    subject,
                    dropped.error
                );
            }
        }
        self.stats.record(&outcome);
        outcome
    }
}
