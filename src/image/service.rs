//! Scene image service trait and the Gemini implementation.
//!
//! [`SceneImageService`] is the seam the producer talks to: one call per
//! paragraph, returning one composite image or a quota signal.
//! [`GeminiImageService`] speaks the Generative Language
//! `models/{model}:generateContent` wire format and pulls the first inline
//! image out of the response.

use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;
use thiserror::Error;

use crate::config::ImageConfig;
use crate::credentials::Credential;
use crate::image::prompt::PanelPromptBuilder;

// ---------------------------------------------------------------------------
// ImageServiceError
// ---------------------------------------------------------------------------

/// Errors returned by a [`SceneImageService`] call.
#[derive(Debug, Error)]
pub enum ImageServiceError {
    /// The credential hit its quota or rate limit.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// Non-success status that is not a quota signal.
    #[error("image API returned status {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body was not the JSON we expected.
    #[error("failed to parse image response: {0}")]
    Parse(String),

    /// The response parsed fine but carried no image part.
    #[error("image API did not return an image")]
    NoImage,
}

impl ImageServiceError {
    pub fn is_quota(&self) -> bool {
        matches!(self, ImageServiceError::QuotaExceeded(_))
    }
}

impl From<reqwest::Error> for ImageServiceError {
    fn from(e: reqwest::Error) -> Self {
        ImageServiceError::Request(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// CompositeImage
// ---------------------------------------------------------------------------

/// Encoded image bytes holding all panels of one paragraph side by side.
#[derive(Debug, Clone)]
pub struct CompositeImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

// ---------------------------------------------------------------------------
// SceneImageService trait
// ---------------------------------------------------------------------------

/// Generates one composite image whose panels depict `panels` in order.
#[async_trait]
pub trait SceneImageService: Send + Sync {
    async fn generate(
        &self,
        panels: &[String],
        credential: &Credential,
    ) -> Result<CompositeImage, ImageServiceError>;
}

// ---------------------------------------------------------------------------
// GeminiImageService
// ---------------------------------------------------------------------------

/// Calls `POST {base_url}/v1beta/models/{model}:generateContent`.
pub struct GeminiImageService {
    client: reqwest::Client,
    base_url: String,
    model: String,
    prompt_builder: PanelPromptBuilder,
}

impl GeminiImageService {
    /// Build the service from config.  The HTTP client carries the
    /// per-request timeout from `config.timeout_secs`.
    pub fn from_config(config: &ImageConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let prompt_builder = match &config.style_hint {
            Some(hint) if !hint.trim().is_empty() => {
                PanelPromptBuilder::new().with_style_hint(hint.trim())
            }
            _ => PanelPromptBuilder::new(),
        };

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            prompt_builder,
        }
    }
}

#[async_trait]
impl SceneImageService for GeminiImageService {
    async fn generate(
        &self,
        panels: &[String],
        credential: &Credential,
    ) -> Result<CompositeImage, ImageServiceError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let prompt = self.prompt_builder.build(panels);

        let body = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [ { "text": prompt } ] }
            ],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"]
            }
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", credential.secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            if is_quota_signal(status.as_u16(), &text) {
                return Err(ImageServiceError::QuotaExceeded(format!(
                    "status {}",
                    status.as_u16()
                )));
            }
            return Err(ImageServiceError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let parsed: GenerateContentResponse =
            serde_json::from_str(&text).map_err(|e| ImageServiceError::Parse(e.to_string()))?;
        extract_image(parsed)
    }
}

/// 429, or a body mentioning resource exhaustion / quota.
pub(crate) fn is_quota_signal(status: u16, body: &str) -> bool {
    status == 429 || body.contains("RESOURCE_EXHAUSTED") || body.contains("Quota exceeded")
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

fn extract_image(response: GenerateContentResponse) -> Result<CompositeImage, ImageServiceError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ImageServiceError::Parse("no candidates".into()))?;
    let content = candidate
        .content
        .ok_or_else(|| ImageServiceError::Parse("no content parts".into()))?;

    for part in content.parts {
        if let Some(text) = part.text {
            log::debug!("image: model description: {text}");
        }
        if let Some(inline) = part.inline_data {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(inline.data.as_bytes())
                .map_err(|e| ImageServiceError::Parse(format!("bad base64 image: {e}")))?;
            return Ok(CompositeImage {
                bytes,
                mime_type: inline.mime_type,
            });
        }
    }

    Err(ImageServiceError::NoImage)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<CompositeImage, ImageServiceError> {
        extract_image(serde_json::from_str(json).expect("valid json"))
    }

    #[test]
    fn first_inline_image_is_extracted() {
        let data = base64::engine::general_purpose::STANDARD.encode(b"PNGDATA");
        let json = format!(
            r#"{{"candidates":[{{"content":{{"parts":[
                {{"text":"four panels"}},
                {{"inlineData":{{"mimeType":"image/png","data":"{data}"}}}}
            ]}}}}]}}"#
        );
        let image = parse(&json).unwrap();
        assert_eq!(image.bytes, b"PNGDATA");
        assert_eq!(image.mime_type, "image/png");
    }

    #[test]
    fn configured_style_hint_reaches_the_prompt() {
        let lines = vec!["A stickman waves.".to_string()];
        let config = ImageConfig {
            style_hint: Some(" Draw on graph paper ".into()),
            ..ImageConfig::default()
        };
        let prompt = GeminiImageService::from_config(&config).prompt_builder.build(&lines);
        assert!(prompt.contains("\n- Draw on graph paper\n"));

        let blank = ImageConfig {
            style_hint: Some("   ".into()),
            ..ImageConfig::default()
        };
        let plain = GeminiImageService::from_config(&blank).prompt_builder.build(&lines);
        assert_eq!(plain, PanelPromptBuilder::new().build(&lines));
    }

    #[test]
    fn text_only_response_is_no_image() {
        let err = parse(r#"{"candidates":[{"content":{"parts":[{"text":"sorry"}]}}]}"#)
            .unwrap_err();
        assert!(matches!(err, ImageServiceError::NoImage));
    }

    #[test]
    fn missing_candidates_is_parse_error() {
        assert!(matches!(
            parse(r#"{"candidates":[]}"#).unwrap_err(),
            ImageServiceError::Parse(_)
        ));
        assert!(matches!(parse("{}").unwrap_err(), ImageServiceError::Parse(_)));
    }

    #[test]
    fn quota_signals_are_recognised() {
        assert!(is_quota_signal(429, ""));
        assert!(is_quota_signal(400, r#"{"status":"RESOURCE_EXHAUSTED"}"#));
        assert!(is_quota_signal(403, "Quota exceeded for metric"));
        assert!(!is_quota_signal(500, "internal"));
    }

    #[test]
    fn only_quota_variant_is_quota() {
        assert!(ImageServiceError::QuotaExceeded("x".into()).is_quota());
        assert!(!ImageServiceError::NoImage.is_quota());
        assert!(!ImageServiceError::Request("x".into()).is_quota());
    }

    #[test]
    fn service_is_object_safe() {
        let service: Box<dyn SceneImageService> =
            Box::new(GeminiImageService::from_config(&ImageConfig::default()));
        drop(service);
    }
}
