use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use ci_analyzer_core::{
    config::StoreConfig,
    models::{
        AnalysisRecord, NewAnalysis, NewPrediction, PredictionRecord, PredictionStatus,
    },
};
use time::OffsetDateTime;
use tokio::sync::Mutex;

/// Append-only store of failed run analyses.
#[async_trait]
pub trait AnalysisRepository: Send + Sync {
    /// Assigns the next id and appends in one step.
    async fn append_analysis(&self, analysis: NewAnalysis) -> AnalysisRecord;

    /// All analyses for a repository, in append order.
    async fn analyses_for_repo(&self, repo_id: u64) -> Vec<AnalysisRecord>;

    async fn analysis_count(&self) -> usize;
}

/// Append-only store of pull request risk predictions.
#[async_trait]
pub trait PredictionRepository: Send + Sync {
    /// Assigns the next id and appends in one step.
    async fn append_prediction(&self, prediction: NewPrediction) -> PredictionRecord;

    /// Open predictions for a repository, in append order.
    async fn open_predictions_for_repo(&self, repo_id: u64) -> Vec<PredictionRecord>;

    async fn prediction_count(&self) -> usize;
}

/// Volatile record store. Nothing survives a restart.
pub struct Database {
    analyses: Mutex<RecordLog<AnalysisRecord>>,
    predictions: Mutex<RecordLog<PredictionRecord>>,
}

struct RecordLog<T> {
    kind: &'static str,
    records: VecDeque<T>,
    last_id: u64,
    // 0 = unbounded
    capacity: usize,
}

impl<T: Clone> RecordLog<T> {
    fn new(kind: &'static str, capacity: usize) -> Self {
        Self { kind, records: VecDeque::new(), last_id: 0, capacity }
    }

    /// Ids keep increasing across evictions, so they never collide with a record
    /// that is still held.
    fn append(&mut self, make: impl FnOnce(u64) -> T) -> T {
        self.last_id += 1;
        let record = make(self.last_id);
        if self.capacity > 0 {
            while self.records.len() >= self.capacity {
                self.records.pop_front();
                tracing::info!(
                    "Evicting oldest {} record (retention limit {})",
                    self.kind,
                    self.capacity
                );
            }
        }
        self.records.push_back(record.clone());
        record
    }
}

impl Database {
    pub fn new(config: &StoreConfig) -> Arc<Self> {
        if config.max_analyses == 0 || config.max_predictions == 0 {
            tracing::warn!("Record retention is unbounded; memory use grows with every event");
        }
        Arc::new(Self {
            analyses: Mutex::new(RecordLog::new("analysis", config.max_analyses)),
            predictions: Mutex::new(RecordLog::new("prediction", config.max_predictions)),
        })
    }
}

#[async_trait]
impl AnalysisRepository for Database {
    async fn append_analysis(&self, analysis: NewAnalysis) -> AnalysisRecord {
        let mut log = self.analyses.lock().await;
        let now = OffsetDateTime::now_utc();
        log.append(|id| AnalysisRecord::from_new(id, now, analysis))
    }

    async fn analyses_for_repo(&self, repo_id: u64) -> Vec<AnalysisRecord> {
        let log = self.analyses.lock().await;
        log.records.iter().filter(|r| r.repo_id == repo_id).cloned().collect()
    }

    async fn analysis_count(&self) -> usize { self.analyses.lock().await.records.len() }
}

#[async_trait]
impl PredictionRepository for Database {
    async fn append_prediction(&self, prediction: NewPrediction) -> PredictionRecord {
        let mut log = self.predictions.lock().await;
        let now = OffsetDateTime::now_utc();
        log.append(|id| PredictionRecord::from_new(id, now, prediction))
    }

    async fn open_predictions_for_repo(&self, repo_id: u64) -> Vec<PredictionRecord> {
        let log = self.predictions.lock().await;
        log.records
            .iter()
            .filter(|r| r.repo_id == repo_id && r.status == PredictionStatus::Open)
            .cloned()
            .collect()
    }

    async fn prediction_count(&self) -> usize { self.predictions.lock().await.records.len() }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn analysis(repo_id: u64, run_id: u64) -> NewAnalysis {
        NewAnalysis {
            repo_id,
            repo_full_name: format!("octo/repo-{repo_id}"),
            github_run_id: run_id,
            status: "failure".to_string(),
            conclusion: "Broken build".to_string(),
            suggestion: "Fix it".to_string(),
            raw_log: "error".to_string(),
        }
    }

    fn prediction(repo_id: u64, pr_number: u64) -> NewPrediction {
        NewPrediction {
            repo_id,
            pr_id: 1000 + pr_number,
            pr_number,
            pr_title: format!("PR {pr_number}"),
            risk_score: 0.5,
        }
    }

    #[tokio::test]
    async fn ids_are_assigned_sequentially() {
        let db = Database::new(&StoreConfig::default());
        let first = db.append_analysis(analysis(7, 42)).await;
        let second = db.append_analysis(analysis(7, 42)).await;
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        // Duplicate deliveries are kept as separate records.
        assert_eq!(db.analyses_for_repo(7).await.len(), 2);
    }

    #[tokio::test]
    async fn analyses_filter_by_repo_in_store_order() {
        let db = Database::new(&StoreConfig::default());
        db.append_analysis(analysis(7, 1)).await;
        db.append_analysis(analysis(8, 2)).await;
        db.append_analysis(analysis(7, 3)).await;
        let runs: Vec<u64> =
            db.analyses_for_repo(7).await.iter().map(|r| r.github_run_id).collect();
        assert_eq!(runs, vec![1, 3]);
        assert!(db.analyses_for_repo(9).await.is_empty());
        assert_eq!(db.analysis_count().await, 3);
    }

    #[tokio::test]
    async fn closed_predictions_are_excluded() {
        let db = Database::new(&StoreConfig::default());
        db.append_prediction(prediction(7, 1)).await;
        db.append_prediction(prediction(7, 2)).await;
        db.append_prediction(prediction(8, 3)).await;
        db.predictions.lock().await.records[0].status = PredictionStatus::Closed;
        let open: Vec<u64> =
            db.open_predictions_for_repo(7).await.iter().map(|r| r.pr_number).collect();
        assert_eq!(open, vec![2]);
        assert_eq!(db.prediction_count().await, 3);
    }

    #[tokio::test]
    async fn retention_evicts_oldest_first() {
        let db = Database::new(&StoreConfig { max_analyses: 2, max_predictions: 2 });
        for run_id in 1..=3 {
            db.append_analysis(analysis(7, run_id)).await;
        }
        let records = db.analyses_for_repo(7).await;
        let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(db.analysis_count().await, 2);
    }

    #[tokio::test]
    async fn zero_capacity_is_unbounded() {
        let db = Database::new(&StoreConfig { max_analyses: 0, max_predictions: 0 });
        for pr in 0..50 {
            db.append_prediction(prediction(7, pr)).await;
        }
        assert_eq!(db.prediction_count().await, 50);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_never_share_an_id() {
        let db = Database::new(&StoreConfig::default());
        let mut handles = Vec::new();
        for run_id in 0..64 {
            let db = db.clone();
            handles.push(tokio::spawn(async move { db.append_analysis(analysis(7, run_id)).await }));
        }
        let mut ids = HashSet::new();
        for handle in handles {
            assert!(ids.insert(handle.await.unwrap().id));
        }
        assert_eq!(ids, (1..=64).collect::<HashSet<u64>>());
    }
}
