use std::{
    collections::BTreeMap,
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use ci_analyzer_inference::AnalyzeError;
use serde::Serialize;

/// Why an event was dropped before a record could be written.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum DropReason {
    JobList,
    LogRedirect,
    LogFetch,
    Completion,
    CompletionParse,
    PullRequestFetch,
    RiskScore,
}

impl DropReason {
    pub const ALL: [Self; 7] = [
        Self::JobList,
        Self::LogRedirect,
        Self::LogFetch,
        Self::Completion,
        Self::CompletionParse,
        Self::PullRequestFetch,
        Self::RiskScore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JobList => "job_list",
            Self::LogRedirect => "log_redirect",
            Self::LogFetch => "log_fetch",
            Self::Completion => "completion",
            Self::CompletionParse => "completion_parse",
            Self::PullRequestFetch => "pull_request_fetch",
            Self::RiskScore => "risk_score",
        }
    }

    fn index(&self) -> usize { *self as usize }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SkipReason {
    NoFailedJob,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoFailedJob => "no_failed_job",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{reason}: {error:#}")]
pub struct Dropped {
    pub reason: DropReason,
    pub error: anyhow::Error,
}

impl From<AnalyzeError> for Dropped {
    fn from(err: AnalyzeError) -> Self {
        let reason = match err {
            AnalyzeError::Completion(_) => DropReason::Completion,
            AnalyzeError::Parse(_) => DropReason::CompletionParse,
        };
        Self { reason, error: err.into() }
    }
}

pub(crate) trait StepExt<T> {
    /// Tags a failed step with the reason the event is dropped.
    fn step(self, reason: DropReason) -> Result<T, Dropped>;
}

impl<T, E> StepExt<T> for Result<T, E>
where E: Into<anyhow::Error>
{
    fn step(self, reason: DropReason) -> Result<T, Dropped> {
        self.map_err(|e| Dropped { reason, error: e.into() })
    }
}

/// Result of running a pipeline for one webhook delivery. The sender is
/// acknowledged the same way for every variant.
#[derive(Debug)]
pub enum PipelineOutcome {
    Recorded { id: u64 },
    Skipped(SkipReason),
    Dropped(Dropped),
}

impl PipelineOutcome {
    pub fn drop_reason(&self) -> Option<DropReason> {
        match self {
            Self::Dropped(dropped) => Some(dropped.reason),
            _ => None,
        }
    }
}

/// Process-lifetime outcome counters.
#[derive(Debug, Default)]
pub struct OutcomeStats {
    recorded: AtomicU64,
    skipped: AtomicU64,
    dropped: [AtomicU64; DropReason::ALL.len()],
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct OutcomeSnapshot {
    pub recorded: u64,
    pub skipped: u64,
    pub dropped: BTreeMap<&'static str, u64>,
}

impl OutcomeStats {
    pub fn record(&self, outcome: &PipelineOutcome) {
        let counter = match outcome {
            PipelineOutcome::Recorded { .. } => &self.recorded,
            PipelineOutcome::Skipped(_) => &self.skipped,
            PipelineOutcome::Dropped(dropped) => &self.dropped[dropped.reason.index()],
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> OutcomeSnapshot {
        OutcomeSnapshot {
            recorded: self.recorded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            dropped: DropReason::ALL
                .iter()
                .map(|reason| (reason.as_str(), self.dropped[reason.index()].load(Ordering::Relaxed)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn reason_indices_match_declaration_order() {
        for (idx, reason) in DropReason::ALL.iter().enumerate() {
            assert_eq!(reason.index(), idx);
        }
    }

    #[test]
    fn snapshot_counts_each_reason() {
        let stats = OutcomeStats::default();
        stats.record(&PipelineOutcome::Recorded { id: 1 });
        stats.record(&PipelineOutcome::Skipped(SkipReason::NoFailedJob));
        for _ in 0..2 {
            stats.record(&PipelineOutcome::Dropped(Dropped {
                reason: DropReason::CompletionParse,
                error: anyhow!("bad json"),
            }));
        }
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.recorded, 1);
        assert_eq!(snapshot.skipped, 1);
        assert_eq!(snapshot.dropped["completion_parse"], 2);
        assert_eq!(snapshot.dropped["log_redirect"], 0);
        assert_eq!(snapshot.dropped.len(), DropReason::ALL.len());
    }

    #[test]
    fn step_tags_errors() {
        let result: Result<(), _> = Err(anyhow!("connection refused")).step(DropReason::RiskScore);
        let dropped = result.unwrap_err();
        assert_eq!(dropped.reason, DropReason::RiskScore);
        assert_eq!(dropped.to_string(), "risk_score: connection refused");
    }
}
