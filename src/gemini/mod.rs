pub mod client;
pub mod error;
pub mod types;

pub use client::{GeminiClient, ImageSynth};
pub use error::GeminiError;
pub use types::{AspectRatio, BookPlan, PageSpec};
