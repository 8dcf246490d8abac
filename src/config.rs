//! Configuration loaded from `bookforge.toml`.
//!
//! [`BookforgeConfig`] holds every tuning knob. Values absent from the file
//! use sensible defaults, and the `GEMINI_API_KEY` environment variable
//! takes precedence over the file for the API key. Concurrency, pacing and
//! retry counts vary widely in practice, so they are configuration rather
//! than constants.

use serde::Deserialize;
use std::path::Path;

use crate::error::BookforgeError;
use crate::retry::RetryPolicy;

/// Top-level configuration loaded from `bookforge.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct BookforgeConfig {
    /// Gemini API key.
    #[serde(default)]
    pub api_key: String,

    /// Model used for the structured planning call.
    #[serde(default = "default_plan_model")]
    pub plan_model: String,

    /// Model used for image synthesis.
    #[serde(default = "default_image_model")]
    pub image_model: String,

    /// Number of interior pages to plan and generate.
    #[serde(default = "default_page_count")]
    pub page_count: usize,

    /// Page jobs dispatched concurrently within one round.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Delay in milliseconds between dispatch rounds.
    #[serde(default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,

    /// Total attempt budget per remote call.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay in milliseconds for exponential backoff.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound of the random jitter added to each backoff delay.
    #[serde(default = "default_jitter_ceiling_ms")]
    pub jitter_ceiling_ms: u64,

    /// Page width in inches, used only to pick the aspect ratio bucket.
    #[serde(default = "default_page_width")]
    pub page_width: f64,

    /// Page height in inches, used only to pick the aspect ratio bucket.
    #[serde(default = "default_page_height")]
    pub page_height: f64,

    /// Directory the generated bundle is written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_plan_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_image_model() -> String {
    "gemini-2.5-flash-image".to_string()
}

fn default_page_count() -> usize {
    20
}

fn default_concurrency() -> usize {
    4
}

fn default_pacing_delay_ms() -> u64 {
    1500
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    2000
}

fn default_jitter_ceiling_ms() -> u64 {
    1000
}

fn default_page_width() -> f64 {
    8.5
}

fn default_page_height() -> f64 {
    11.0
}

fn default_output_dir() -> String {
    "book-output".to_string()
}

impl Default for BookforgeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            plan_model: default_plan_model(),
            image_model: default_image_model(),
            page_count: default_page_count(),
            concurrency: default_concurrency(),
            pacing_delay_ms: default_pacing_delay_ms(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            jitter_ceiling_ms: default_jitter_ceiling_ms(),
            page_width: default_page_width(),
            page_height: default_page_height(),
            output_dir: default_output_dir(),
        }
    }
}

impl BookforgeConfig {
    /// Load configuration from `bookforge.toml` in the current directory,
    /// falling back to defaults when the file does not exist.
    pub fn load() -> Result<Self, BookforgeError> {
        let path = Path::new("bookforge.toml");
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<BookforgeConfig>(&contents)?
        } else {
            Self::default()
        };

        // The environment variable wins over the config file for the API key.
        if let Ok(key) = std::env::var("GEMINI_API_KEY")
            && !key.is_empty()
        {
            config.api_key = key;
        }

        Ok(config)
    }

    /// Backoff policy for remote calls, built from the retry knobs.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay_ms: self.base_delay_ms,
            jitter_ceiling_ms: self.jitter_ceiling_ms,
        }
    }
}
