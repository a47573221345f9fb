use std::fmt::Display;

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, de::IgnoredAny};

/// Extract a GitHub event payload from the `X-GitHub-Event` header and JSON body.
///
/// Senders are not authenticated; any well-formed delivery is accepted.
#[derive(Debug, Clone)]
#[must_use]
pub struct GitHubEvent {
    pub event: WebhookEvent,
}

impl<S> FromRequest<S> for GitHubEvent
where S: Send + Sync
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        fn err(m: impl Display) -> Response {
            tracing::error!("{m}");
            (StatusCode::BAD_REQUEST, m.to_string()).into_response()
        }
        let kind = req
            .headers()
            .get("X-GitHub-Event")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| err("X-GitHub-Event header missing"))?
            .to_string();
        let body = Bytes::from_request(req, state).await.map_err(|_| err("error reading body"))?;
        let event = WebhookEvent::try_from_header_and_body(&kind, &body)
            .map_err(|e| err(format!("error parsing {kind} body: {e}")))?;
        Ok(GitHubEvent { event })
    }
}

#[derive(Debug, Clone)]
pub enum WebhookEvent {
    WorkflowRun(WorkflowRunEvent),
    PullRequest(PullRequestEvent),
    Other { kind: String },
}

impl WebhookEvent {
    pub fn try_from_header_and_body(kind: &str, body: &[u8]) -> serde_json::Result<Self> {
        match kind {
            "workflow_run" => serde_json::from_slice(body).map(Self::WorkflowRun),
            "pull_request" => serde_json::from_slice(body).map(Self::PullRequest),
            _ => serde_json::from_slice::<IgnoredAny>(body)
                .map(|_| Self::Other { kind: kind.to_string() }),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::WorkflowRun(_) => "workflow_run",
            Self::PullRequest(_) => "pull_request",
            Self::Other { kind } => kind,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowRunAction {
    Requested,
    InProgress,
    Completed,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRunEvent {
    pub action: WorkflowRunAction,
    pub workflow_run: WorkflowRun,
    pub repository: EventRepository,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    #[serde(default)]
    pub conclusion: Option<String>,
    pub jobs_url: String,
}

impl WorkflowRun {
    pub fn is_failure(&self) -> bool { self.conclusion.as_deref() == Some("failure") }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestAction {
    Opened,
    Synchronize,
    Reopened,
    Edited,
    Closed,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    pub action: PullRequestAction,
    pub pull_request: PullRequestSummary,
    pub repository: EventRepository,
}

/// Webhook view of a pull request. Only `url` is trusted; everything else is
/// re-fetched.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestSummary {
    pub url: String,
    pub number: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventRepository {
    pub id: u64,
    pub full_name: String,
}
