use std::sync::Arc;

use anyhow::anyhow;
use ci_analyzer_core::models::{AiAnalysis, LogDocument};

use crate::completion::CompletionProvider;

const PROMPT_TEMPLATE: &str = r#"You are an expert software development assistant. Analyze the following CI/CD error log and provide a concise root cause and a suggested fix.
Format your response as a JSON object with two keys: "conclusion" and "suggestion".

Log:
---
{log}
---
"#;

pub fn build_prompt(log: &LogDocument) -> String { PROMPT_TEMPLATE.replace("{log}", log.as_str()) }

/// Removes every code-fence marker (` ```json ` and ` ``` `) and surrounding whitespace.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// The completion was not a JSON object with string `conclusion` and `suggestion` keys.
#[derive(Debug, thiserror::Error)]
#[error("completion is not a valid analysis object: {source}")]
pub struct CompletionParseError {
    #[source]
    pub source: serde_json::Error,
}

/// Sole parsing boundary between a completion and [`AiAnalysis`].
pub fn parse_completion(text: &str) -> Result<AiAnalysis, CompletionParseError> {
    serde_json::from_str(&strip_code_fences(text)).map_err(|source| CompletionParseError { source })
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("completion request failed: {0:#}")]
    Completion(anyhow::Error),
    #[error(transparent)]
    Parse(#[from] CompletionParseError),
}

#[derive(Clone)]
pub struct RootCauseAnalyzer {
    provider: Option<Arc<dyn CompletionProvider>>,
}

impl RootCauseAnalyzer {
    pub fn new(provider: Option<Arc<dyn CompletionProvider>>) -> Self { Self { provider } }

    pub async fn analyze(&self, log: &LogDocument) -> Result<AiAnalysis, AnalyzeError> {
        let Some(provider) = &self.provider else {
            return Err(AnalyzeError::Completion(anyhow!("No completion provider configured")));
        };
        let completion =
            provider.complete(&build_prompt(log)).await.map_err(AnalyzeError::Completion)?;
        tracing::debug!("Received completion ({} bytes)", completion.len());
        Ok(parse_completion(&completion)?)
    }
}
