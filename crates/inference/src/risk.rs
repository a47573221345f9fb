use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use ci_analyzer_core::{
    config::RiskConfig,
    models::{Features, RiskPrediction},
};

#[async_trait]
pub trait RiskScorer: Send + Sync {
    async fn score(&self, features: &Features) -> Result<RiskPrediction>;
}

/// Client for the risk-scoring service's `POST /predict` endpoint.
pub struct HttpRiskScorer {
    client: reqwest::Client,
    url: String,
}

#[derive(serde::Deserialize)]
struct ScorerError {
    error: String,
}

impl HttpRiskScorer {
    pub fn new(config: &RiskConfig) -> Result<Self> {
        let client = reqwest::Client::builder().build().context("Failed to create HTTP client")?;
        Ok(Self { client, url: config.url.clone() })
    }
}

#[async_trait]
impl RiskScorer for HttpRiskScorer {
    async fn score(&self, features: &Features) -> Result<RiskPrediction> {
        let response = self
            .client
            .post(&self.url)
            .json(features)
            .send()
            .await
            .with_context(|| format!("Failed to reach risk scorer at {}", self.url))?;
        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ScorerError>().await {
                Ok(body) => body.error,
                Err(_) => "no error message".to_string(),
            };
            bail!("Risk scorer returned {status}: {message}");
        }
        response.json().await.context("Risk scorer returned an unexpected response")
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    const FEATURES: Features = Features { lines_added: 120, lines_deleted: 30, files_changed: 4 };

    fn scorer(server: &MockServer) -> HttpRiskScorer {
        HttpRiskScorer::new(&RiskConfig { url: server.url("/predict") }).unwrap()
    }

    #[tokio::test]
    async fn posts_features_and_reads_score() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/predict").json_body(json!({
                    "lines_added": 120,
                    "lines_deleted": 30,
                    "files_changed": 4
                }));
                then.status(200).json_body(json!({"risk_score": 0.82}));
            })
            .await;
        let prediction = scorer(&server).score(&FEATURES).await.unwrap();
        mock.assert_async().await;
        assert_eq!(prediction.risk_score, 0.82);
    }

    #[tokio::test]
    async fn surfaces_scorer_error_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/predict");
                then.status(500).json_body(json!({"error": "Model is not loaded."}));
            })
            .await;
        let err = scorer(&server).score(&FEATURES).await.unwrap_err();
        assert!(err.to_string().contains("Model is not loaded."), "{err}");
    }

    #[tokio::test]
    async fn rejects_response_without_score() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/predict");
                then.status(200).json_body(json!({"score": 0.5}));
            })
            .await;
        assert!(scorer(&server).score(&FEATURES).await.is_err());
    }
}
