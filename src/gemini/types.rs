//! Request and response types for the Gemini `generateContent` endpoint,
//! plus the parsed book plan and the supported aspect-ratio buckets.
//!
//! Wire structs serialize with camelCase field names as the API expects.
//! The plan structs parse leniently: every field defaults when missing, so a
//! partially filled response never fails deserialization — the only hard
//! requirement (the page count) is enforced by the response schema sent with
//! the request.

use serde::{Deserialize, Serialize};

/// Request body for `models/{model}:generateContent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

/// One content turn — a list of parts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// A single content part: either text or inline binary data, never both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

/// Base64-encoded binary payload inside a response part.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64-encoded bytes.
    pub data: String,
}

/// Generation tuning knobs. Only the fields this client uses are modeled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageConfig>,
}

/// Image-specific generation options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    /// One of the supported ratio ids, e.g. `"3:4"`.
    pub aspect_ratio: String,
}

/// Response body for `generateContent`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Content,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Book metadata plus one spec per page, parsed from the planning call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookPlan {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub pages: Vec<PageSpec>,
}

/// Title and drawing prompt for one page of the book.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSpec {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub prompt: String,
}

/// The aspect-ratio buckets the image endpoint accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    Square,
    Portrait3x4,
    Landscape4x3,
    Portrait9x16,
    Landscape16x9,
}

impl AspectRatio {
    /// Bucket scan order for `closest`. On a distance tie the earlier entry
    /// wins, which makes the tie-break deterministic.
    const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Portrait3x4,
        AspectRatio::Landscape4x3,
        AspectRatio::Portrait9x16,
        AspectRatio::Landscape16x9,
    ];

    /// The wire id the API expects, e.g. `"3:4"`.
    pub fn id(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Landscape4x3 => "4:3",
            AspectRatio::Portrait9x16 => "9:16",
            AspectRatio::Landscape16x9 => "16:9",
        }
    }

    /// Numeric width/height value of this bucket.
    pub fn value(self) -> f64 {
        match self {
            AspectRatio::Square => 1.0,
            AspectRatio::Portrait3x4 => 3.0 / 4.0,
            AspectRatio::Landscape4x3 => 4.0 / 3.0,
            AspectRatio::Portrait9x16 => 9.0 / 16.0,
            AspectRatio::Landscape16x9 => 16.0 / 9.0,
        }
    }

    /// Snap requested output dimensions to the nearest supported bucket.
    ///
    /// Pure and deterministic: identical inputs always pick the same bucket,
    /// and ties go to the first minimal match in scan order.
    pub fn closest(width: f64, height: f64) -> AspectRatio {
        let requested = width / height;
        let mut best = Self::ALL[0];
        let mut best_distance = (best.value() - requested).abs();
        for bucket in Self::ALL.into_iter().skip(1) {
            let distance = (bucket.value() - requested).abs();
            if distance < best_distance {
                best = bucket;
                best_distance = distance;
            }
        }
        best
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_page_maps_to_portrait() {
        // 8.5 x 11 inches -> 0.7727, nearest bucket is 3:4 (0.75).
        assert_eq!(AspectRatio::closest(8.5, 11.0), AspectRatio::Portrait3x4);
    }

    #[test]
    fn closest_is_deterministic() {
        for _ in 0..10 {
            assert_eq!(AspectRatio::closest(8.5, 11.0), AspectRatio::Portrait3x4);
        }
    }

    #[test]
    fn exact_ratios_map_to_themselves() {
        assert_eq!(AspectRatio::closest(100.0, 100.0), AspectRatio::Square);
        assert_eq!(AspectRatio::closest(3.0, 4.0), AspectRatio::Portrait3x4);
        assert_eq!(AspectRatio::closest(4.0, 3.0), AspectRatio::Landscape4x3);
        assert_eq!(AspectRatio::closest(9.0, 16.0), AspectRatio::Portrait9x16);
        assert_eq!(AspectRatio::closest(16.0, 9.0), AspectRatio::Landscape16x9);
    }

    #[test]
    fn wide_input_maps_to_widest_bucket() {
        assert_eq!(AspectRatio::closest(40.0, 9.0), AspectRatio::Landscape16x9);
    }

    #[test]
    fn ratio_ids() {
        assert_eq!(AspectRatio::Portrait3x4.id(), "3:4");
        assert_eq!(AspectRatio::Portrait3x4.to_string(), "3:4");
        assert!((AspectRatio::Landscape16x9.value() - 16.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn book_plan_parses_leniently() {
        // Missing metadata fields default instead of failing the parse.
        let json = r#"{"pages": [{"title": "A cat", "prompt": "a cat on the moon"}]}"#;
        let plan: BookPlan = serde_json::from_str(json).unwrap();
        assert!(plan.title.is_empty());
        assert!(plan.keywords.is_empty());
        assert_eq!(plan.pages.len(), 1);
        assert_eq!(plan.pages[0].title, "A cat");
    }

    #[test]
    fn inline_data_field_names_are_camel_case() {
        let part = Part {
            text: None,
            inline_data: Some(InlineData {
                mime_type: "image/png".into(),
                data: "aGVsbG8=".into(),
            }),
        };
        let json = serde_json::to_string(&part).unwrap();
        assert!(json.contains("inlineData"));
        assert!(json.contains("mimeType"));
        assert!(!json.contains("inline_data"));
    }

    #[test]
    fn response_parses_image_part() {
        let json = r#"{
            "candidates": [{
                "content": {"parts": [{"inlineData": {"mimeType": "image/png", "data": "QUJD"}}]},
                "finishReason": "STOP"
            }]
        }"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let part = &resp.candidates[0].content.parts[0];
        assert_eq!(part.inline_data.as_ref().unwrap().data, "QUJD");
        assert_eq!(resp.candidates[0].finish_reason.as_deref(), Some("STOP"));
    }
}
