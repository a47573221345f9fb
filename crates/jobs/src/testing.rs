//! In-memory fakes of the upstream services for pipeline tests.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use ci_analyzer_core::{
    config::StoreConfig,
    models::{Features, LogDocument, RiskPrediction},
};
use ci_analyzer_db::Database;
use ci_analyzer_github::{Job, PullRequestSnapshot, SourceControl};
use ci_analyzer_inference::{CompletionProvider, RiskScorer, RootCauseAnalyzer};
use url::Url;

use crate::{JobContext, OutcomeStats};

const LOG_HOST: &str = "https://logs.example.com/";

pub struct FakeGitHub {
    jobs: Option<Vec<Job>>,
    redirect: bool,
    log: Option<String>,
    pull_request: Option<PullRequestSnapshot>,
    resolved: Mutex<Vec<(String, u64)>>,
}

impl Default for FakeGitHub {
    fn default() -> Self {
        Self {
            jobs: Some(vec![]),
            redirect: true,
            log: Some("Error: build failed".to_string()),
            pull_request: None,
            resolved: Mutex::new(vec![]),
        }
    }
}

impl FakeGitHub {
    pub fn with_jobs(jobs: Vec<Job>) -> Self { Self { jobs: Some(jobs), ..Self::default() } }

    pub fn log(self, text: &str) -> Self { Self { log: Some(text.to_string()), ..self } }

    pub fn pull_request(self, pr: PullRequestSnapshot) -> Self {
        Self { pull_request: Some(pr), ..self }
    }

    pub fn fail_jobs(self) -> Self { Self { jobs: None, ..self } }

    pub fn fail_redirect(self) -> Self { Self { redirect: false, ..self } }

    pub fn fail_log(self) -> Self { Self { log: None, ..self } }

    /// `(repo_full_name, job_id)` pairs whose log location was requested.
    pub fn resolved_jobs(&self) -> Vec<(String, u64)> { self.resolved.lock().unwrap().clone() }
}

#[async_trait]
impl SourceControl for FakeGitHub {
    async fn list_jobs(&self, _jobs_url: &str) -> Result<Vec<Job>> {
        self.jobs.clone().ok_or_else(|| anyhow!("502 Bad Gateway"))
    }

    async fn resolve_job_log(&self, repo_full_name: &str, job_id: u64) -> Result<Url> {
        self.resolved.lock().unwrap().push((repo_full_name.to_string(), job_id));
        if !self.redirect {
            bail!("expected a redirect to the job log, got 200 OK");
        }
        Ok(Url::parse(LOG_HOST)?.join(&format!("jobs/{job_id}"))?)
    }

    async fn fetch_log(&self, _location: &Url) -> Result<LogDocument> {
        match &self.log {
            Some(text) => Ok(LogDocument::new(text.clone())),
            None => bail!("404 Not Found"),
        }
    }

    async fn pull_request(&self, url: &str) -> Result<PullRequestSnapshot> {
        self.pull_request.clone().ok_or_else(|| anyhow!("404 Not Found: {url}"))
    }
}

struct CannedCompletion(String);

#[async_trait]
impl CompletionProvider for CannedCompletion {
    async fn complete(&self, _prompt: &str) -> Result<String> { Ok(self.0.clone()) }
}

#[derive(Default)]
pub struct FakeScorer {
    failing: AtomicBool,
    calls: Mutex<Vec<Features>>,
}

impl FakeScorer {
    pub fn fail(&self) { self.failing.store(true, Ordering::Relaxed); }

    pub fn calls(&self) -> Vec<Features> { self.calls.lock().unwrap().clone() }
}

#[async_trait]
impl RiskScorer for FakeScorer {
    async fn score(&self, features: &Features) -> Result<RiskPrediction> {
        self.calls.lock().unwrap().push(*features);
        if self.failing.load(Ordering::Relaxed) {
            bail!("Risk scorer returned 500 Internal Server Error: Model is not loaded.");
        }
        Ok(RiskPrediction { risk_score: 0.82 })
    }
}

pub struct Harness {
    pub ctx: JobContext,
    pub db: Arc<Database>,
    pub scorer: Arc<FakeScorer>,
}

impl Harness {
    /// A context whose completion provider always replies with `completion`.
    pub fn new(completion: &str) -> Self {
        let db = Database::new(&StoreConfig::default());
        let scorer = Arc::new(FakeScorer::default());
        let ctx = JobContext {
            analyzer: RootCauseAnalyzer::new(Some(Arc::new(CannedCompletion(
                completion.to_string(),
            )))),
            scorer: scorer.clone(),
            analyses: db.clone(),
            predictions: db.clone(),
            stats: Arc::new(OutcomeStats::default()),
        };
        Self { ctx, db, scorer }
    }
}
