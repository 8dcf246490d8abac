//! HTTP client for the Gemini `generateContent` endpoint.
//!
//! Two operations: `plan` asks for structured book metadata plus a fixed
//! number of page specs (the count is enforced through the response schema),
//! and `synthesize_image` asks for a single image constrained to an aspect
//! ratio bucket. Both go through [`with_backoff`], so transient 429/503
//! failures are retried here and callers only ever see post-exhaustion
//! failures.

use std::time::Duration;

use reqwest::Client;

use super::error::GeminiError;
use super::types::{
    AspectRatio, BookPlan, Content, GenerateContentRequest, GenerateContentResponse,
    GenerationConfig, ImageConfig, Part,
};
use crate::retry::{RetryPolicy, with_backoff};

const API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Anything that can turn a prompt into an image payload.
///
/// The orchestrator is generic over this seam so tests can drive it with a
/// scripted fake instead of a live endpoint.
#[allow(async_fn_in_trait)]
pub trait ImageSynth {
    /// Generate one image and return its base64-encoded payload.
    async fn synthesize(&self, prompt: String, aspect: AspectRatio)
    -> Result<String, GeminiError>;
}

pub struct GeminiClient {
    api_key: String,
    client: Client,
    base_url: String,
    plan_model: String,
    image_model: String,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(
        api_key: String,
        plan_model: String,
        image_model: String,
        retry: RetryPolicy,
    ) -> Self {
        Self::with_base_url(api_key, plan_model, image_model, retry, API_URL.to_string())
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(
        api_key: String,
        plan_model: String,
        image_model: String,
        retry: RetryPolicy,
        base_url: String,
    ) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(180))
            .build()
            .expect("failed to build HTTP client");
        Self {
            api_key,
            client,
            base_url,
            plan_model,
            image_model,
            retry,
        }
    }

    /// Request book metadata and exactly `page_count` page specs.
    ///
    /// The page count is a schema constraint on the response, not a hope: a
    /// "successful" response with zero pages still fails with
    /// [`GeminiError::EmptyPlan`]. Metadata fields parse leniently.
    pub async fn plan(
        &self,
        topic: &str,
        target_age: Option<&str>,
        page_count: usize,
    ) -> Result<BookPlan, GeminiError> {
        let instruction = plan_instruction(topic, target_age, page_count);
        let instruction = instruction.as_str();
        let this = self;
        with_backoff(&self.retry, move || this.plan_once(instruction, page_count)).await
    }

    /// Generate one image for `prompt`, snapped to `aspect`.
    ///
    /// A transport-successful response with no embeddable image part fails
    /// with [`GeminiError::NoImageData`] — never a silent placeholder.
    pub async fn synthesize_image(
        &self,
        prompt: &str,
        aspect: AspectRatio,
    ) -> Result<String, GeminiError> {
        let this = self;
        with_backoff(&self.retry, move || this.synthesize_once(prompt, aspect)).await
    }

    async fn plan_once(
        &self,
        instruction: &str,
        page_count: usize,
    ) -> Result<BookPlan, GeminiError> {
        let req = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::text(instruction)],
            }],
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".into()),
                response_schema: Some(plan_schema(page_count)),
                ..Default::default()
            }),
        };

        let response = self.generate(&self.plan_model, &req).await?;
        let text = response
            .candidates
            .first()
            .and_then(|c| c.content.parts.iter().find_map(|p| p.text.clone()))
            .ok_or_else(|| GeminiError::ParseError("no text part in planning response".into()))?;

        let plan: BookPlan =
            serde_json::from_str(&text).map_err(|e| GeminiError::ParseError(e.to_string()))?;
        if plan.pages.is_empty() {
            return Err(GeminiError::EmptyPlan);
        }
        Ok(plan)
    }

    async fn synthesize_once(
        &self,
        prompt: &str,
        aspect: AspectRatio,
    ) -> Result<String, GeminiError> {
        let req = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::text(prompt)],
            }],
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["IMAGE".into()]),
                image_config: Some(ImageConfig {
                    aspect_ratio: aspect.id().to_string(),
                }),
                ..Default::default()
            }),
        };

        let response = self.generate(&self.image_model, &req).await?;
        response
            .candidates
            .first()
            .and_then(|c| c.content.parts.iter().find_map(|p| p.inline_data.as_ref()))
            .map(|data| data.data.clone())
            .ok_or(GeminiError::NoImageData)
    }

    async fn generate(
        &self,
        model: &str,
        req: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(req)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let message = read_error_body(response).await;
            return Err(GeminiError::RateLimited { message });
        }

        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            let message = read_error_body(response).await;
            return Err(GeminiError::Overloaded { message });
        }

        if !status.is_success() {
            let message = read_error_body(response).await;
            return Err(GeminiError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json::<GenerateContentResponse>().await?;
        Ok(body)
    }
}

impl ImageSynth for GeminiClient {
    async fn synthesize(
        &self,
        prompt: String,
        aspect: AspectRatio,
    ) -> Result<String, GeminiError> {
        self.synthesize_image(&prompt, aspect).await
    }
}

async fn read_error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string())
}

fn plan_instruction(topic: &str, target_age: Option<&str>, page_count: usize) -> String {
    let audience = target_age.unwrap_or("4-8");
    format!(
        "Plan a coloring book about \"{topic}\" for children aged {audience}. \
         Provide marketplace metadata (title, subtitle, description, keywords) and \
         exactly {page_count} page ideas. Each page idea needs a short title and a \
         one-sentence scene description usable as an illustration prompt."
    )
}

/// Response schema for the planning call. `minItems`/`maxItems` pin the page
/// count so the model cannot return a short list on a "successful" call.
fn plan_schema(page_count: usize) -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "title": {"type": "STRING"},
            "subtitle": {"type": "STRING"},
            "description": {"type": "STRING"},
            "keywords": {"type": "ARRAY", "items": {"type": "STRING"}},
            "pages": {
                "type": "ARRAY",
                "minItems": page_count,
                "maxItems": page_count,
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": {"type": "STRING"},
                        "prompt": {"type": "STRING"}
                    },
                    "required": ["title", "prompt"]
                }
            }
        },
        "required": ["title", "pages"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: String, max_attempts: u32) -> GeminiClient {
        GeminiClient::with_base_url(
            "test-key".into(),
            "plan-model".into(),
            "image-model".into(),
            RetryPolicy {
                max_attempts,
                base_delay_ms: 1,
                jitter_ceiling_ms: 0,
            },
            base_url,
        )
    }

    fn text_response(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": {"parts": [{"text": text}]},
                "finishReason": "STOP"
            }]
        })
    }

    fn image_response(data: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": {"parts": [{"inlineData": {"mimeType": "image/png", "data": data}}]},
                "finishReason": "STOP"
            }]
        })
    }

    #[tokio::test]
    async fn plan_parses_structured_response() {
        let server = MockServer::start().await;
        let plan_json = json!({
            "title": "Space Cats",
            "subtitle": "A cosmic coloring adventure",
            "description": "Cats in space.",
            "keywords": ["cats", "space"],
            "pages": [
                {"title": "Moon Cat", "prompt": "a cat bouncing on the moon"},
                {"title": "Rocket Cat", "prompt": "a cat piloting a rocket"}
            ]
        });
        Mock::given(method("POST"))
            .and(path("/models/plan-model:generateContent"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(text_response(&plan_json.to_string())),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(server.uri(), 1);
        let plan = client.plan("Space Cats", None, 2).await.unwrap();

        assert_eq!(plan.title, "Space Cats");
        assert_eq!(plan.pages.len(), 2);
        assert_eq!(plan.pages[1].title, "Rocket Cat");
    }

    #[tokio::test]
    async fn plan_with_zero_pages_is_an_error() {
        let server = MockServer::start().await;
        let plan_json = json!({"title": "Empty Book", "pages": []});
        Mock::given(method("POST"))
            .and(path("/models/plan-model:generateContent"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(text_response(&plan_json.to_string())),
            )
            .mount(&server)
            .await;

        let client = test_client(server.uri(), 1);
        let result = client.plan("Nothing", None, 20).await;
        assert!(matches!(result, Err(GeminiError::EmptyPlan)));
    }

    #[tokio::test]
    async fn synthesize_returns_payload_and_sends_aspect_ratio() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/image-model:generateContent"))
            .and(body_partial_json(json!({
                "generationConfig": {"imageConfig": {"aspectRatio": "3:4"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(image_response("QUJD")))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(server.uri(), 1);
        let payload = client
            .synthesize_image("a cat", AspectRatio::Portrait3x4)
            .await
            .unwrap();
        assert_eq!(payload, "QUJD");
    }

    #[tokio::test]
    async fn synthesize_without_image_part_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/image-model:generateContent"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(text_response("sorry, text only")),
            )
            .mount(&server)
            .await;

        let client = test_client(server.uri(), 1);
        let result = client.synthesize_image("a cat", AspectRatio::Square).await;
        assert!(matches!(result, Err(GeminiError::NoImageData)));
    }

    #[tokio::test]
    async fn rate_limit_maps_to_its_own_variant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/image-model:generateContent"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let client = test_client(server.uri(), 1);
        let result = client.synthesize_image("a cat", AspectRatio::Square).await;
        assert!(matches!(result, Err(GeminiError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn transient_failure_is_retried_then_succeeds() {
        let server = MockServer::start().await;
        // First call gets a 503, the retry gets a real image.
        Mock::given(method("POST"))
            .and(path("/models/image-model:generateContent"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/models/image-model:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(image_response("T0s=")))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(server.uri(), 3);
        let payload = client
            .synthesize_image("a cat", AspectRatio::Square)
            .await
            .unwrap();
        assert_eq!(payload, "T0s=");
    }

    #[tokio::test]
    async fn bad_request_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/image-model:generateContent"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid argument"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(server.uri(), 5);
        let result = client.synthesize_image("a cat", AspectRatio::Square).await;
        assert!(matches!(
            result,
            Err(GeminiError::ApiError { status: 400, .. })
        ));
    }
}
