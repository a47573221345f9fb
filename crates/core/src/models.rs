use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Maximum number of characters of a job log used for prompting and storage.
pub const LOG_CHAR_LIMIT: usize = 30_000;

/// Raw job log text, truncated to [`LOG_CHAR_LIMIT`] characters on construction.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct LogDocument(String);

impl LogDocument {
    pub fn new(mut text: String) -> Self {
        if let Some((idx, _)) = text.char_indices().nth(LOG_CHAR_LIMIT) {
            text.truncate(idx);
        }
        Self(text)
    }

    pub fn as_str(&self) -> &str { &self.0 }

    pub fn into_string(self) -> String { self.0 }

    pub fn char_count(&self) -> usize { self.0.chars().count() }
}

/// Root cause extracted from a generative-text completion.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysis {
    pub conclusion: String,
    pub suggestion: String,
}

/// Pull request metrics fed to the risk scorer.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct Features {
    pub lines_added: i64,
    pub lines_deleted: i64,
    pub files_changed: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskPrediction {
    pub risk_score: f64,
}

/// A failed workflow run analysis, ready to be appended to the store.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NewAnalysis {
    pub repo_id: u64,
    pub repo_full_name: String,
    pub github_run_id: u64,
    pub status: String,
    pub conclusion: String,
    pub suggestion: String,
    pub raw_log: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: u64,
    pub repo_id: u64,
    pub repo_full_name: String,
    pub github_run_id: u64,
    pub status: String,
    pub conclusion: String,
    pub suggestion: String,
    pub raw_log: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl AnalysisRecord {
    pub fn from_new(id: u64, created_at: OffsetDateTime, new: NewAnalysis) -> Self {
        let NewAnalysis {
            repo_id,
            repo_full_name,
            github_run_id,
            status,
            conclusion,
            suggestion,
            raw_log,
        } = new;
        Self {
            id,
            repo_id,
            repo_full_name,
            github_run_id,
            status,
            conclusion,
            suggestion,
            raw_log,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Default)]
pub enum PredictionStatus {
    #[default]
    Open,
    Closed,
}

/// A pull request risk score, ready to be appended to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPrediction {
    pub repo_id: u64,
    pub pr_id: u64,
    pub pr_number: u64,
    pub pr_title: String,
    pub risk_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    pub id: u64,
    pub repo_id: u64,
    pub pr_id: u64,
    pub pr_number: u64,
    pub pr_title: String,
    pub risk_score: f64,
    pub status: PredictionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl PredictionRecord {
    /// New predictions always start out [`PredictionStatus::Open`].
    pub fn from_new(id: u64, created_at: OffsetDateTime, new: NewPrediction) -> Self {
        Self {
            id,
            repo_id: new.repo_id,
            pr_id: new.pr_id,
            pr_number: new.pr_number,
            pr_title: new.pr_title,
            risk_score: new.risk_score,
            status: PredictionStatus::Open,
            created_at,
        }
    }
}
