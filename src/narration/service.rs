//! Narration service trait and the ElevenLabs implementation.
//!
//! [`ElevenLabsService`] calls the `with-timestamps` text-to-speech endpoint,
//! which returns base64 audio plus a per-character alignment.  The end time
//! of the last aligned character is the track duration; when the alignment
//! is missing the duration is left unknown and the caller probes the file.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;
use thiserror::Error;

use crate::config::NarrationConfig;

// ---------------------------------------------------------------------------
// NarrationServiceError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum NarrationServiceError {
    /// Quota or rate limit hit.  `retry_after` is the service's hint, if any.
    #[error("narration quota exceeded")]
    QuotaExceeded { retry_after: Option<Duration> },

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("narration API returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse narration response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for NarrationServiceError {
    fn from(e: reqwest::Error) -> Self {
        NarrationServiceError::Request(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// NarrationAudio
// ---------------------------------------------------------------------------

/// Encoded audio for the whole script.
#[derive(Debug, Clone)]
pub struct NarrationAudio {
    /// MP3 bytes.
    pub bytes: Vec<u8>,
    /// Track length in seconds when the service reports it.
    pub duration_secs: Option<f64>,
}

// ---------------------------------------------------------------------------
// NarrationService trait
// ---------------------------------------------------------------------------

/// Synthesises speech for `text` in one call.
#[async_trait]
pub trait NarrationService: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<NarrationAudio, NarrationServiceError>;
}

// ---------------------------------------------------------------------------
// ElevenLabsService
// ---------------------------------------------------------------------------

/// Calls `POST {base_url}/v1/text-to-speech/{voice_id}/with-timestamps`.
pub struct ElevenLabsService {
    client: reqwest::Client,
    config: NarrationConfig,
    api_key: String,
}

impl ElevenLabsService {
    pub fn from_config(config: &NarrationConfig, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl NarrationService for ElevenLabsService {
    async fn synthesize(&self, text: &str) -> Result<NarrationAudio, NarrationServiceError> {
        let url = format!(
            "{}/v1/text-to-speech/{}/with-timestamps",
            self.config.base_url.trim_end_matches('/'),
            self.config.voice_id
        );
        let body = serde_json::json!({
            "text": text,
            "model_id": self.config.model_id,
        });

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .query(&[("output_format", "mp3_44100_128")])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let header_hint = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<f64>().ok());
        let text = response.text().await?;

        if status.as_u16() == 429 || text.contains("quota_exceeded") {
            let retry_after = header_hint
                .or_else(|| parse_retry_hint(&text))
                .and_then(retry_hint_duration);
            return Err(NarrationServiceError::QuotaExceeded { retry_after });
        }
        if !status.is_success() {
            return Err(NarrationServiceError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let parsed: TimestampedSpeech =
            serde_json::from_str(&text).map_err(|e| NarrationServiceError::Parse(e.to_string()))?;
        decode_speech(parsed)
    }
}

/// Longest server-requested wait honoured before retrying.
pub(crate) const MAX_RETRY_HINT: Duration = Duration::from_secs(300);

/// Convert a hint in seconds to a wait, capped at [`MAX_RETRY_HINT`].
/// Negative or non-finite hints count as no hint.
pub(crate) fn retry_hint_duration(secs: f64) -> Option<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(
        Duration::try_from_secs_f64(secs)
            .map_or(MAX_RETRY_HINT, |d| d.min(MAX_RETRY_HINT)),
    )
}

/// Find a "retry in 12.5s" style hint in an error body.
pub(crate) fn parse_retry_hint(body: &str) -> Option<f64> {
    let lower = body.to_ascii_lowercase();
    let start = lower.find("retry in ")? + "retry in ".len();
    let digits: String = lower[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let rest = &lower[start + digits.len()..];
    if !rest.starts_with('s') {
        return None;
    }
    digits.parse().ok()
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TimestampedSpeech {
    audio_base64: String,
    alignment: Option<Alignment>,
}

#[derive(Debug, Deserialize)]
struct Alignment {
    #[serde(default)]
    character_end_times_seconds: Vec<f64>,
}

fn decode_speech(speech: TimestampedSpeech) -> Result<NarrationAudio, NarrationServiceError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(speech.audio_base64.as_bytes())
        .map_err(|e| NarrationServiceError::Parse(format!("bad base64 audio: {e}")))?;
    if bytes.is_empty() {
        return Err(NarrationServiceError::Parse("empty audio".into()));
    }

    let duration_secs = speech
        .alignment
        .and_then(|a| a.character_end_times_seconds.last().copied())
        .filter(|d| *d > 0.0);

    Ok(NarrationAudio {
        bytes,
        duration_secs,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
