//! Clients for the model-backed services: generative-text completion for root-cause
//! analysis and the pull request risk scorer.

pub mod completion;
pub mod risk;
pub mod root_cause;

pub use completion::{CompletionProvider, OpenAiProvider};
pub use risk::{HttpRiskScorer, RiskScorer};
pub use root_cause::{AnalyzeError, CompletionParseError, RootCauseAnalyzer};
