pub mod gemini;

use async_trait::async_trait;
use ember_common::{Error, Result};

use crate::keys::{ApiKey, KeyRotator};

/// Trait for generative-model provider integrations. The provider is a
/// black box: prompt (plus optional inline image) in, text out, fallible.
/// The credential is supplied per call so rotation stays outside the
/// provider.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier (e.g. "gemini").
    fn provider_id(&self) -> &str;

    /// Generate a completion for the request using the given credential.
    async fn generate(&self, key: &ApiKey, request: &GenerateRequest) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub image: Option<InlineImage>,
}

impl GenerateRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
        }
    }

    pub fn with_image(prompt: impl Into<String>, image: InlineImage) -> Self {
        Self {
            prompt: prompt.into(),
            image: Some(image),
        }
    }
}

/// A decoded inline image ready for the provider wire format: a sniffed
/// media type plus clean (prefix-free) base64 data.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

/// Pull the next credential from the rotator and invoke the provider.
/// An empty rotation set maps to a provider error here; interactive
/// callers that need a softer failure check the rotator themselves.
pub async fn generate_with_rotation(
    rotator: &KeyRotator,
    provider: &dyn LlmProvider,
    request: &GenerateRequest,
) -> Result<String> {
    let key = rotator
        .next_key()
        .ok_or_else(|| Error::Provider("no provider credentials configured".to_string()))?;
    provider.generate(&key, request).await
}
