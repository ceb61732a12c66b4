use std::time::Duration;

use async_trait::async_trait;
use ember_common::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{GenerateRequest, LlmProvider};
use crate::keys::ApiKey;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Provider implementation for the Gemini `generateContent` REST API.
///
/// The API key is passed per request (see [`LlmProvider::generate`]); this
/// struct only owns the HTTP client, model name, and endpoint.
pub struct GeminiProvider {
    client: Client,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Provider(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            model: model.into(),
            base_url: BASE_URL.to_string(),
        })
    }

    /// Point the provider at a different endpoint. Test hook.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request_body(request: &GenerateRequest) -> GenerateContentRequest {
        let mut parts = vec![Part::Text {
            text: request.prompt.clone(),
        }];
        if let Some(image) = &request.image {
            parts.push(Part::InlineData {
                inline_data: InlineDataPayload {
                    mime_type: image.mime_type.clone(),
                    data: image.data.clone(),
                },
            });
        }
        GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
        }
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn provider_id(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, key: &ApiKey, request: &GenerateRequest) -> Result<String> {
        let url = format!(
            "{}/{model}:generateContent?key={api_key}",
            self.base_url,
            model = self.model,
            api_key = key.expose(),
        );

        let body = Self::request_body(request);
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let raw = response
                .text()
                .await
                .unwrap_or_else(|_| "unreadable error body".to_string());
            return Err(Error::Provider(format!(
                "API error {status}: {}",
                extract_error_message(&raw)
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("malformed response: {e}")))?;

        extract_text(parsed)
            .ok_or_else(|| Error::Provider("no text in response candidates".to_string()))
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineDataPayload,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineDataPayload {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

fn extract_text(response: GenerateContentResponse) -> Option<String> {
    response
        .candidates
        .and_then(|mut candidates| candidates.pop())
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let status = wrapper.error.status.unwrap_or_default();
            let message = wrapper.error.message.unwrap_or_else(|| body.to_string());
            if status.is_empty() {
                message
            } else {
                format!("{status}: {message}")
            }
        })
        .unwrap_or_else(|_| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_includes_inline_image_when_present() {
        let request = GenerateRequest::with_image(
            "what is this?",
            crate::providers::InlineImage {
                mime_type: "image/png".to_string(),
                data: "AAAA".to_string(),
            },
        );
        let body = GeminiProvider::request_body(&request);
        let json = serde_json::to_value(&body).expect("serializable");

        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "what is this?");
        assert_eq!(
            json["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "image/png"
        );
        assert_eq!(json["contents"][0]["parts"][1]["inlineData"]["data"], "AAAA");
    }

    #[test]
    fn text_only_request_has_a_single_part() {
        let body = GeminiProvider::request_body(&GenerateRequest::text("hello"));
        let json = serde_json::to_value(&body).expect("serializable");
        assert_eq!(json["contents"][0]["parts"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn error_message_extraction_prefers_structured_body() {
        let body = r#"{"error": {"code": 429, "message": "quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(
            extract_error_message(body),
            "RESOURCE_EXHAUSTED: quota exceeded"
        );
        assert_eq!(extract_error_message("plain text"), "plain text");
    }
}
