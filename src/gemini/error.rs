//! Error types for the Gemini generation client.
//!
//! [`GeminiError`] covers transport failures, HTTP-level failures split by
//! retryability (429 and 503 get their own variants so the retry layer can
//! classify without string matching), and the two content-level failures the
//! orchestration layer cares about: an empty plan and an image response with
//! no image in it.

use thiserror::Error;

/// Errors that can occur while talking to the Gemini API.
#[derive(Debug, Error)]
pub enum GeminiError {
    /// The server returned HTTP 429. The API advertises no retry-after hint,
    /// so the caller's backoff policy decides how long to wait.
    #[error("rate limited: {message}")]
    RateLimited { message: String },

    /// The server returned HTTP 503 (model overloaded).
    #[error("service overloaded: {message}")]
    Overloaded { message: String },

    /// Any other non-success HTTP status (e.g. 400 bad prompt, 401 bad key).
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The planning call succeeded transport-wise but returned zero page specs.
    #[error("planning returned an empty page list")]
    EmptyPlan,

    /// The image call succeeded transport-wise but carried no inline image part.
    #[error("image response contained no image data")]
    NoImageData,

    /// The response body could not be parsed into the expected shape.
    #[error("failed to parse API response: {0}")]
    ParseError(String),

    /// Underlying network failure (DNS, connection refused, timeout).
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}
