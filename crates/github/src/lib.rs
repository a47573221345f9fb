pub mod webhook;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use ci_analyzer_core::{
    config::GitHubConfig,
    models::{Features, LogDocument},
};
use octocrab::Octocrab;
use reqwest::{
    StatusCode,
    header::{ACCEPT, LOCATION},
    redirect,
};
use serde::Deserialize;
use url::Url;

const USER_AGENT: &str = concat!("ci-analyzer/", env!("CARGO_PKG_VERSION"));
const GITHUB_JSON: &str = "application/vnd.github+json";

#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
}

impl Job {
    pub fn is_failure(&self) -> bool { self.conclusion.as_deref() == Some("failure") }
}

#[derive(Debug, Deserialize)]
struct JobList {
    jobs: Vec<Job>,
}

/// The fields of a pull request the risk scorer needs, as returned by the
/// pull request endpoint (webhook payloads may omit the counts).
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestSnapshot {
    pub id: u64,
    pub number: u64,
    #[serde(default)]
    pub title: String,
    pub additions: i64,
    pub deletions: i64,
    pub changed_files: i64,
    pub url: String,
}

impl PullRequestSnapshot {
    /// Counts are passed through as reported, without validation.
    pub fn features(&self) -> Features {
        Features {
            lines_added: self.additions,
            lines_deleted: self.deletions,
            files_changed: self.changed_files,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogRedirectError {
    #[error("expected a redirect to the job log, got {0}")]
    NotRedirected(StatusCode),
    #[error("log redirect has no Location header")]
    MissingLocation,
    #[error("log redirect Location is not a valid URL: {0}")]
    InvalidLocation(String),
}

/// Calls made against the source-control platform on behalf of webhook events.
#[async_trait]
pub trait SourceControl: Send + Sync {
    async fn list_jobs(&self, jobs_url: &str) -> Result<Vec<Job>>;

    /// Resolves the job's log download URL from a single, unfollowed redirect.
    async fn resolve_job_log(&self, repo_full_name: &str, job_id: u64) -> Result<Url>;

    async fn fetch_log(&self, location: &Url) -> Result<LogDocument>;

    async fn pull_request(&self, url: &str) -> Result<PullRequestSnapshot>;
}

/// GitHub client authenticated with the service credential.
pub struct GitHub {
    client: Octocrab,
    http: reqwest::Client,
    logs: reqwest::Client,
    token: String,
    api_base: String,
}

impl GitHub {
    pub fn new(config: &GitHubConfig, token: &str) -> Result<Arc<Self>> {
        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .base_uri(config.api_base.as_str())
            .context("Invalid GitHub API base URL")?
            .build()
            .context("Failed to create GitHub client")?;
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirect::Policy::none())
            .build()
            .context("Failed to create HTTP client")?;
        let logs = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Arc::new(Self {
            client,
            http,
            logs,
            token: token.to_string(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }))
    }
}

#[async_trait]
impl SourceControl for GitHub {
    async fn list_jobs(&self, jobs_url: &str) -> Result<Vec<Job>> {
        let list: JobList = self
            .client
            .get(jobs_url, None::<&()>)
            .await
            .with_context(|| format!("Failed to fetch jobs from {jobs_url}"))?;
        tracing::debug!("Fetched {} jobs from {}", list.jobs.len(), jobs_url);
        Ok(list.jobs)
    }

    async fn resolve_job_log(&self, repo_full_name: &str, job_id: u64) -> Result<Url> {
        let url = format!("{}/repos/{}/actions/jobs/{}/logs", self.api_base, repo_full_name, job_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .header(ACCEPT, GITHUB_JSON)
            .send()
            .await
            .with_context(|| format!("Failed to request log location for job {job_id}"))?;
        Ok(redirect_location(&response)?)
    }

    async fn fetch_log(&self, location: &Url) -> Result<LogDocument> {
        let text = self
            .logs
            .get(location.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .context("Failed to download job log")?
            .text()
            .await
            .context("Failed to read job log")?;
        Ok(LogDocument::new(text))
    }

    async fn pull_request(&self, url: &str) -> Result<PullRequestSnapshot> {
        self.client
            .get(url, None::<&()>)
            .await
            .with_context(|| format!("Failed to fetch pull request {url}"))
    }
}

fn redirect_location(response: &reqwest::Response) -> Result<Url, LogRedirectError> {
    let status = response.status();
    if !status.is_redirection() {
        return Err(LogRedirectError::NotRedirected(status));
    }
    let location = response.headers().get(LOCATION).ok_or(LogRedirectError::MissingLocation)?;
    let location = location
        .to_str()
        .map_err(|_| LogRedirectError::InvalidLocation(format!("{location:?}")))?;
    // Relative locations resolve against the request URL.
    response.url().join(location).map_err(|_| LogRedirectError::InvalidLocation(location.to_string()))
}
