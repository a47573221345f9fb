use ci_analyzer_core::models::NewPrediction;
use ci_analyzer_github::{SourceControl, webhook::PullRequestEvent};

use crate::{
    JobContext,
    outcome::{DropReason, Dropped, PipelineOutcome, StepExt},
};

/// A pull request that was opened or received new commits.
#[derive(Debug, Clone)]
pub struct PullRequestRiskJob {
    pub repository_id: u64,
    /// API URL of the pull request; the webhook summary is not trusted for counts.
    pub url: String,
    pub number: u64,
}

impl From<&PullRequestEvent> for PullRequestRiskJob {
    fn from(event: &PullRequestEvent) -> Self {
        Self {
            repository_id: event.repository.id,
            url: event.pull_request.url.clone(),
            number: event.pull_request.number,
        }
    }
}

/// Score the change size of a pull request and store the prediction.
pub async fn process_pull_request_risk(
    ctx: &JobContext,
    github: &dyn SourceControl,
    job: PullRequestRiskJob,
) -> PipelineOutcome {
    tracing::info!("Processing pull request: repo={} pr=#{}", job.repository_id, job.number);
    let subject = format!("pull request #{} of repo {}", job.number, job.repository_id);
    let outcome = match score_pull_request(ctx, github, job).await {
        Ok(outcome) => outcome,
        Err(dropped) => PipelineOutcome::Dropped(dropped),
    };
    ctx.finish(&subject, outcome)
}

async fn score_pull_request(
    ctx: &JobContext,
    github: &dyn SourceControl,
    job: PullRequestRiskJob,
) -> Result<PipelineOutcome, Dropped> {
    let pr = github.pull_request(&job.url).await.step(DropReason::PullRequestFetch)?;
    let features = pr.features();
    let prediction = ctx.scorer.score(&features).await.step(DropReason::RiskScore)?;
    tracing::debug!(
        "PR #{}: +{} -{} in {} files scored {}",
        pr.number,
        features.lines_added,
        features.lines_deleted,
        features.files_changed,
        prediction.risk_score
    );

    let record = ctx
        .predictions
        .append_prediction(NewPrediction {
            repo_id: job.repository_id,
            pr_id: pr.id,
            pr_number: pr.number,
            pr_title: pr.title,
            risk_score: prediction.risk_score,
        })
        .await;
    Ok(PipelineOutcome::Recorded { id: record.id })
}
