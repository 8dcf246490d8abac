//! Classification-aware retry with exponential backoff and jitter.
//!
//! Wraps a single remote call. Rate-limited and overloaded failures are
//! retried while the attempt budget lasts; everything else propagates
//! immediately so a bad prompt or a bad API key is never masked as a
//! transient failure. Backoff only suspends the calling operation — other
//! in-flight calls keep running while one caller waits.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

use crate::gemini::GeminiError;

/// Retryability class of a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The service is enforcing its request quota (HTTP 429 or quota wording).
    RateLimited,
    /// The backend is temporarily overloaded (HTTP 503 or overload wording).
    Overloaded,
    /// Anything else — not worth retrying.
    Fatal,
}

impl ErrorClass {
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorClass::RateLimited | ErrorClass::Overloaded)
    }
}

/// Classify a failure for retry decisions.
///
/// Structured status codes win; the textual fallback only runs for errors
/// that carry no usable status (some transport errors stringify the code).
pub fn classify(err: &GeminiError) -> ErrorClass {
    match err {
        GeminiError::RateLimited { .. } => ErrorClass::RateLimited,
        GeminiError::Overloaded { .. } => ErrorClass::Overloaded,
        GeminiError::ApiError { status, message } => classify_parts(Some(*status), message),
        GeminiError::NetworkError(err) => {
            classify_parts(err.status().map(|s| s.as_u16()), &err.to_string())
        }
        _ => ErrorClass::Fatal,
    }
}

fn classify_parts(status: Option<u16>, message: &str) -> ErrorClass {
    match status {
        Some(429) => return ErrorClass::RateLimited,
        Some(503) => return ErrorClass::Overloaded,
        Some(_) => return ErrorClass::Fatal,
        None => {}
    }
    let lower = message.to_lowercase();
    if lower.contains("429") || lower.contains("quota") || lower.contains("rate limit") {
        ErrorClass::RateLimited
    } else if lower.contains("503") || lower.contains("overloaded") || lower.contains("unavailable")
    {
        ErrorClass::Overloaded
    } else {
        ErrorClass::Fatal
    }
}

/// Backoff configuration for one wrapped call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt budget. `0` is treated as a single attempt, no retries.
    pub max_attempts: u32,
    /// Base delay in milliseconds before the first retry.
    pub base_delay_ms: u64,
    /// Upper bound of the uniform random jitter added to every delay.
    pub jitter_ceiling_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 2000,
            jitter_ceiling_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Delay growth per retry. Doubling keeps concurrently backing-off
    /// callers spread out once jitter is added on top.
    const GROWTH_FACTOR: f64 = 2.0;

    /// Delay before the retry following failed attempt number `attempt`
    /// (zero-based): `base * 2^attempt + uniform(0..=jitter_ceiling)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let backoff = self.base_delay_ms as f64 * Self::GROWTH_FACTOR.powi(attempt as i32);
        let jitter = rand::thread_rng().gen_range(0..=self.jitter_ceiling_ms);
        Duration::from_millis(backoff as u64 + jitter)
    }
}

/// Run `operation`, retrying transient failures under `policy`.
///
/// Returns the first success, or the error from the final attempt once the
/// budget is exhausted or a fatal error shows up.
pub async fn with_backoff<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, GeminiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GeminiError>>,
{
    let budget = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let class = classify(&err);
                if !class.is_transient() || attempt + 1 >= budget {
                    return Err(err);
                }
                let delay = policy.delay_for_attempt(attempt);
                log_retry(attempt + 1, budget, &err, delay);
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

fn log_retry(attempt: u32, budget: u32, err: &GeminiError, delay: Duration) {
    eprintln!(
        "  ↻ Retry {attempt}/{budget}: {err} (waiting {}ms)",
        delay.as_millis()
    );
}
