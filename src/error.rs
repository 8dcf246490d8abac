use thiserror::Error;

use crate::batch::OrchestrateError;
use crate::gemini::GeminiError;

#[derive(Debug, Error)]
pub enum BookforgeError {
    #[error("API key missing. Set GEMINI_API_KEY or api_key in bookforge.toml.")]
    MissingApiKey,

    #[error("Generation error: {0}")]
    Gemini(#[from] GeminiError),

    #[error("Orchestration error: {0}")]
    Orchestrate(#[from] OrchestrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl BookforgeError {
    /// True when the failure means "out of quota" — the caller should show a
    /// wait-and-retry message instead of a generic one.
    pub fn is_quota(&self) -> bool {
        match self {
            BookforgeError::Orchestrate(err) => err.is_quota(),
            BookforgeError::Gemini(err) => {
                matches!(err, GeminiError::RateLimited { .. })
            }
            _ => false,
        }
    }
}
