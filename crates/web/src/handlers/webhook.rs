use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ci_analyzer_core::AppError;
use ci_analyzer_github::webhook::{
    GitHubEvent, PullRequestAction, WebhookEvent, WorkflowRunAction,
};
use ci_analyzer_jobs::{
    PullRequestRiskJob, WorkflowFailureJob, process_pull_request_risk, process_workflow_failure,
};

use crate::AppState;

pub const MISSING_CREDENTIAL: &str = "Cannot process webhook without authentication context.";
pub const RECEIVED: &str = "Webhook received.";

enum Dispatch {
    WorkflowFailure(WorkflowFailureJob),
    PullRequestRisk(PullRequestRiskJob),
}

fn dispatch(event: &WebhookEvent) -> Option<Dispatch> {
    match event {
        WebhookEvent::WorkflowRun(run)
            if run.action == WorkflowRunAction::Completed && run.workflow_run.is_failure() =>
        {
            Some(Dispatch::WorkflowFailure(run.into()))
        }
        WebhookEvent::PullRequest(pr)
            if matches!(pr.action, PullRequestAction::Opened | PullRequestAction::Synchronize) =>
        {
            Some(Dispatch::PullRequestRisk(pr.into()))
        }
        _ => None,
    }
}

/// Webhook handler that starts the matching pipeline and acknowledges without waiting
/// for it. Pipelines are spawned detached from the request, so a sender that hangs up
/// cannot cancel one midway; outcomes are logged and counted by the pipeline itself.
pub async fn webhook(
    State(state): State<AppState>,
    GitHubEvent { event }: GitHubEvent,
) -> Result<Response, AppError> {
    let Some(dispatch) = dispatch(&event) else {
        tracing::debug!("Ignoring webhook event {}", event.kind());
        return Ok((StatusCode::OK, RECEIVED).into_response());
    };
    let Some(github) = state.github.clone() else {
        return Err(AppError::BadRequest(MISSING_CREDENTIAL));
    };

    let jobs = state.jobs.clone();
    tokio::spawn(async move {
        match dispatch {
            Dispatch::WorkflowFailure(job) => {
                process_workflow_failure(&jobs, github.as_ref(), job).await;
            }
            Dispatch::PullRequestRisk(job) => {
                process_pull_request_risk(&jobs, github.as_ref(), job).await;
            }
        }
    });
    tracing::debug!("Dispatched webhook event {}", event.kind());
    Ok((StatusCode::OK, RECEIVED).into_response())
}
