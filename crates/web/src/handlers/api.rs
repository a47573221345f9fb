use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use ci_analyzer_core::models::{AnalysisRecord, PredictionRecord};
use ci_analyzer_db::{AnalysisRepository, Database, PredictionRepository};
use ci_analyzer_jobs::OutcomeSnapshot;
use serde::Serialize;

use crate::AppState;

pub async fn get_analyses(
    State(db): State<Arc<Database>>,
    Path(repo_id): Path<u64>,
) -> Json<Vec<AnalysisRecord>> {
    Json(db.analyses_for_repo(repo_id).await)
}

/// Only predictions still marked open.
pub async fn get_predictions(
    State(db): State<Arc<Database>>,
    Path(repo_id): Path<u64>,
) -> Json<Vec<PredictionRecord>> {
    Json(db.open_predictions_for_repo(repo_id).await)
}

#[derive(Serialize)]
pub struct StatusResponse {
    outcomes: OutcomeSnapshot,
    analyses: usize,
    predictions: usize,
    github_configured: bool,
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        outcomes: state.jobs.stats.snapshot(),
        analyses: state.db.analysis_count().await,
        predictions: state.db.prediction_count().await,
        github_configured: state.github.is_some(),
    })
}
