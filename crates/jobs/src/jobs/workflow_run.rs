use ci_analyzer_core::models::NewAnalysis;
use ci_analyzer_github::{SourceControl, webhook::WorkflowRunEvent};

use crate::{
    JobContext,
    outcome::{DropReason, Dropped, PipelineOutcome, SkipReason, StepExt},
};

/// A completed workflow run that concluded in failure.
#[derive(Debug, Clone)]
pub struct WorkflowFailureJob {
    pub repository_id: u64,
    pub repository_full_name: String,
    pub run_id: u64,
    /// Stored as the analysis status.
    pub conclusion: String,
    pub jobs_url: String,
}

impl From<&WorkflowRunEvent> for WorkflowFailureJob {
    fn from(event: &WorkflowRunEvent) -> Self {
        Self {
            repository_id: event.repository.id,
            repository_full_name: event.repository.full_name.clone(),
            run_id: event.workflow_run.id,
            conclusion: event.workflow_run.conclusion.clone().unwrap_or_default(),
            jobs_url: event.workflow_run.jobs_url.clone(),
        }
    }
}

/// Analyze the log of the first failed job in a workflow run and store the result.
pub async fn process_workflow_failure(
    ctx: &JobContext,
    github: &dyn SourceControl,
    job: WorkflowFailureJob,
) -> PipelineOutcome {
    tracing::info!(
        "Processing failed workflow run: repo={} run={}",
        job.repository_full_name,
        job.run_id
    );
    let subject = format!("workflow run {} of {}", job.run_id, job.repository_full_name);
    let outcome = match analyze_run(ctx, github, job).await {
        Ok(outcome) => outcome,
        Err(dropped) => PipelineOutcome::Dropped(dropped),
    };
    ctx.finish(&subject, outcome)
}

async fn analyze_run(
    ctx: &JobContext,
    github: &dyn SourceControl,
    job: WorkflowFailureJob,
) -> Result<PipelineOutcome, Dropped> {
    let jobs = github.list_jobs(&job.jobs_url).await.step(DropReason::JobList)?;
    let Some(failed) = jobs.iter().find(|j| j.is_failure()) else {
        return Ok(PipelineOutcome::Skipped(SkipReason::NoFailedJob));
    };
    tracing::debug!(
        "Run {} failed in job {} ({})",
        job.run_id,
        failed.id,
        failed.name.as_deref().unwrap_or("unnamed")
    );

    let location = github
        .resolve_job_log(&job.repository_full_name, failed.id)
        .await
        .step(DropReason::LogRedirect)?;
    let log = github.fetch_log(&location).await.step(DropReason::LogFetch)?;
    let analysis = ctx.analyzer.analyze(&log).await?;

    let record = ctx
        .analyses
        .append_analysis(NewAnalysis {
            repo_id: job.repository_id,
            repo_full_name: job.repository_full_name,
            github_run_id: job.run_id,
            status: job.conclusion,
            conclusion: analysis.conclusion,
            suggestion: analysis.suggestion,
            raw_log: log.into_string(),
        })
        .await;
    Ok(PipelineOutcome::Recorded { id: record.id })
}
