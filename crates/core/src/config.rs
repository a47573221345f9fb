use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable consulted when the config file carries no service token.
pub const TOKEN_ENV: &str = "GITHUB_PERSONAL_ACCESS_TOKEN";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    pub ai: Option<AiConfig>,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file {}", path.display()))?;
        let mut config: Config = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        if config.github.token().is_none() {
            config.github.token = std::env::var(TOKEN_ENV).ok();
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Dashboard origin allowed by CORS. Any origin when unset.
    pub cors_origin: Option<String>,
}

fn default_port() -> u16 { 3001 }

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHubConfig {
    /// Service credential used for every webhook-triggered API call.
    pub token: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl GitHubConfig {
    /// The service credential, treating an empty value as absent.
    pub fn token(&self) -> Option<&str> { self.token.as_deref().filter(|t| !t.trim().is_empty()) }
}

impl Default for GitHubConfig {
    fn default() -> Self { Self { token: None, api_base: default_api_base() } }
}

fn default_api_base() -> String { "https://api.github.com".to_string() }

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AiConfig {
    pub api_key: String,
    /// Any OpenAI-compatible endpoint.
    pub api_base: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_model() -> String { "gpt-4o-mini".to_string() }

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RiskConfig {
    #[serde(default = "default_risk_url")]
    pub url: String,
}

impl Default for RiskConfig {
    fn default() -> Self { Self { url: default_risk_url() } }
}

fn default_risk_url() -> String { "http://localhost:5000/predict".to_string() }

/// Retention limits for the in-memory record stores. `0` disables the cap.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_max_records")]
    pub max_analyses: usize,
    #[serde(default = "default_max_records")]
    pub max_predictions: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { max_analyses: default_max_records(), max_predictions: default_max_records() }
    }
}

fn default_max_records() -> usize { 10_000 }
