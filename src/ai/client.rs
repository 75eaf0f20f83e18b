//! Generative model seam and the Gemini implementation.
//!
//! Flows build a [`GenerateRequest`] (ordered prompt parts plus the response
//! modalities) and hand it to a [`GenerativeModel`]. [`GeminiClient`] sends
//! it to the `generateContent` endpoint with a blocking client and a fixed
//! request timeout. There are no retries.

use super::AiError;
use super::data_uri::DataUri;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// One prompt part, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Image(DataUri),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Text,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub parts: Vec<Part>,
    pub response_modalities: Vec<Modality>,
}

/// What the model returned: images in order, plus any text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateResponse {
    pub images: Vec<DataUri>,
    pub text: Option<String>,
}

/// A model that turns prompt parts into images.
pub trait GenerativeModel {
    fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, AiError>;
}

/// Blocking client for Gemini `generateContent`.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, AiError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        })
    }

    /// Client configured from `[ai]`, with the key from the first set variable.
    pub fn from_config(config: &crate::config::AiConfig) -> Result<Self, AiError> {
        let api_key = config
            .api_key_env
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|key| !key.trim().is_empty())
            .ok_or_else(|| AiError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(
            &config.endpoint,
            &config.model,
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

impl GenerativeModel for GeminiClient {
    fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, AiError> {
        let body = WireRequest::from(request);
        let url = self.url();
        info!(model = %self.model, parts = request.parts.len(), "calling model");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()?;
        let status = response.status();
        let text = response.text()?;
        debug!(status = status.as_u16(), bytes = text.len(), "model responded");
        if !status.is_success() {
            return Err(AiError::Status {
                status: status.as_u16(),
                body: truncate(&text, 500),
            });
        }

        let wire: WireResponse = serde_json::from_str(&text)?;
        wire.into_response()
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

// =========================================================================
// Wire format
// =========================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    contents: Vec<WireContent>,
    generation_config: WireGenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    response_modalities: Vec<Modality>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WireContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "inline_data")]
    inline_data: Option<WireInlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireInlineData {
    #[serde(alias = "mime_type")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Deserialize)]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
}

#[derive(Debug, Default, Deserialize)]
struct WireCandidate {
    #[serde(default)]
    content: Option<WireContent>,
}

impl From<&GenerateRequest> for WireRequest {
    fn from(request: &GenerateRequest) -> Self {
        let parts = request
            .parts
            .iter()
            .map(|part| match part {
                Part::Image(uri) => WirePart {
                    text: None,
                    inline_data: Some(WireInlineData {
                        mime_type: uri.mime_type.clone(),
                        data: uri.payload(),
                    }),
                },
                Part::Text(text) => WirePart {
                    text: Some(text.clone()),
                    inline_data: None,
                },
            })
            .collect();
        Self {
            contents: vec![WireContent {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: WireGenerationConfig {
                response_modalities: request.response_modalities.clone(),
            },
        }
    }
}

impl WireResponse {
    fn into_response(self) -> Result<GenerateResponse, AiError> {
        let mut out = GenerateResponse::default();
        let parts = self
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts);
        for part in parts {
            if let Some(inline) = part.inline_data {
                if inline.data.is_empty() {
                    continue;
                }
                out.images
                    .push(DataUri::from_base64(&inline.mime_type, &inline.data)?);
            } else if let Some(text) = part.text {
                out.text.get_or_insert_with(String::new).push_str(&text);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_in_wire_shape() {
        let request = GenerateRequest {
            parts: vec![
                Part::Image(DataUri::from_bytes("image/png", b"hello".to_vec())),
                Part::Text("remove it".to_string()),
            ],
            response_modalities: vec![Modality::Image],
        };
        let json = serde_json::to_value(WireRequest::from(&request)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        {"inlineData": {"mimeType": "image/png", "data": "aGVsbG8="}},
                        {"text": "remove it"}
                    ]
                }],
                "generationConfig": {"responseModalities": ["IMAGE"]}
            })
        );
    }

    #[test]
    fn response_images_extracted_in_order() {
        let raw = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "here you go"},
                    {"inlineData": {"mimeType": "image/png", "data": "aGVsbG8="}},
                    {"inline_data": {"mime_type": "image/jpeg", "data": "aGk="}}
                ]}
            }]
        }"#;
        let wire: WireResponse = serde_json::from_str(raw).unwrap();
        let response = wire.into_response().unwrap();
        assert_eq!(response.text.as_deref(), Some("here you go"));
        assert_eq!(response.images.len(), 2);
        assert_eq!(response.images[0].bytes, b"hello");
        assert_eq!(response.images[1].mime_type, "image/jpeg");
    }

    #[test]
    fn response_without_candidates_is_empty() {
        let wire: WireResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(wire.into_response().unwrap(), GenerateResponse::default());
    }

    #[test]
    fn response_with_bad_payload_is_rejected() {
        let raw = r#"{"candidates":[{"content":{"parts":[
            {"inlineData":{"mimeType":"image/png","data":"%%%"}}
        ]}}]}"#;
        let wire: WireResponse = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            wire.into_response(),
            Err(AiError::InvalidDataUri(_))
        ));
    }

    #[test]
    fn url_joins_endpoint_and_model() {
        let client = GeminiClient::new(
            "https://example.test/v1beta/",
            "image-model",
            "key".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.url(),
            "https://example.test/v1beta/models/image-model:generateContent"
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé…");
        assert_eq!(truncate("ok", 10), "ok");
    }
}
