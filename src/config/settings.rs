//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//!
//! Credentials may live in the TOML file, but the usual source is the
//! environment: `GEMINI_API_KEY_1` … `GEMINI_API_KEY_4` for the image
//! service and `ELEVENLABS_API_KEY` for narration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

/// Environment variables scanned (in order) for image-service credentials.
pub const IMAGE_KEY_ENV_VARS: [&str; 4] = [
    "GEMINI_API_KEY_1",
    "GEMINI_API_KEY_2",
    "GEMINI_API_KEY_3",
    "GEMINI_API_KEY_4",
];

/// Environment variable holding the narration-service credential.
pub const NARRATION_KEY_ENV_VAR: &str = "ELEVENLABS_API_KEY";

// ---------------------------------------------------------------------------
// ImageConfig
// ---------------------------------------------------------------------------

/// Settings for the scene image service and its retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Base URL of the Generative Language API.
    pub base_url: String,
    /// Model identifier that can return inline images.
    pub model: String,
    /// Credentials listed directly in the settings file.  Merged with the
    /// `GEMINI_API_KEY_*` environment variables by [`AppConfig::image_credentials`].
    pub api_keys: Vec<String>,
    /// Fixed part of the pre-call stagger delay.
    pub stagger_base_ms: u64,
    /// Upper bound of the random jitter added to the stagger delay.
    pub stagger_jitter_ms: u64,
    /// Fixed wait after a quota signal, before retrying with the next key.
    pub quota_backoff_ms: u64,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
    /// Extra style rule appended to every panel prompt, e.g.
    /// `"Use a chalkboard background"`.
    pub style_hint: Option<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".into(),
            model: "gemini-2.0-flash-exp".into(),
            api_keys: Vec::new(),
            stagger_base_ms: 3_000,
            stagger_jitter_ms: 1_500,
            quota_backoff_ms: 8_000,
            timeout_secs: 120,
            style_hint: None,
        }
    }
}

// ---------------------------------------------------------------------------
// NarrationConfig
// ---------------------------------------------------------------------------

/// Settings for the text-to-speech service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    /// Base URL of the ElevenLabs-compatible API.
    pub base_url: String,
    /// Voice used for the narration track.
    pub voice_id: String,
    /// Synthesis model identifier.
    pub model_id: String,
    /// API key: `None` means "read `ELEVENLABS_API_KEY`".
    pub api_key: Option<String>,
    /// Minimum spacing between two synthesis calls, process-wide.
    pub min_call_spacing_ms: u64,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io".into(),
            voice_id: "21m00Tcm4TlvDq8ikWAM".into(),
            model_id: "eleven_multilingual_v2".into(),
            api_key: None,
            min_call_spacing_ms: 15_000,
            timeout_secs: 120,
        }
    }
}

// ---------------------------------------------------------------------------
// VideoConfig
// ---------------------------------------------------------------------------

/// Transcoder settings: output geometry and tool locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Fixed output frame rate.
    pub fps: u32,
    /// ffmpeg colour name used for letterbox padding.
    pub pad_color: String,
    /// `ffmpeg` executable (name on `PATH` or absolute path).
    pub ffmpeg_path: String,
    /// `ffprobe` executable (name on `PATH` or absolute path).
    pub ffprobe_path: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 25,
            pad_color: "white".into(),
            ffmpeg_path: "ffmpeg".into(),
            ffprobe_path: "ffprobe".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// OutputConfig
// ---------------------------------------------------------------------------

/// Where finished videos and per-run scratch files are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Publicly servable directory receiving `video_{timestamp}_{run id}.mp4`.
    pub output_dir: PathBuf,
    /// URL prefix under which `output_dir` is served.
    pub public_prefix: String,
    /// Root of the per-run scratch directories.
    pub scratch_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("public").join("generated"),
            public_prefix: "/generated".into(),
            scratch_dir: PathBuf::from("temp_video"),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use stickman_studio::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// let mut config = config;
/// config.image.style_hint = Some("Use a chalkboard background".into());
/// config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scene image service settings.
    pub image: ImageConfig,
    /// Narration service settings.
    pub narration: NarrationConfig,
    /// Transcoder settings.
    pub video: VideoConfig,
    /// Output and scratch locations.
    pub output: OutputConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Image-service credentials from the settings file followed by the
    /// `GEMINI_API_KEY_*` environment variables.
    pub fn image_credentials(&self) -> Vec<String> {
        let from_env = IMAGE_KEY_ENV_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok());
        merge_credentials(self.image.api_keys.iter().cloned().chain(from_env))
    }

    /// Narration credential from the settings file, else `ELEVENLABS_API_KEY`.
    pub fn narration_credential(&self) -> Option<String> {
        self.narration
            .api_key
            .clone()
            .or_else(|| std::env::var(NARRATION_KEY_ENV_VAR).ok())
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

impl ImageConfig {
    pub fn stagger_base(&self) -> Duration {
        Duration::from_millis(self.stagger_base_ms)
    }

    pub fn stagger_jitter(&self) -> Duration {
        Duration::from_millis(self.stagger_jitter_ms)
    }

    pub fn quota_backoff(&self) -> Duration {
        Duration::from_millis(self.quota_backoff_ms)
    }
}

impl NarrationConfig {
    pub fn min_call_spacing(&self) -> Duration {
        Duration::from_millis(self.min_call_spacing_ms)
    }
}

/// Trim, drop blanks and de-duplicate while keeping first-seen order.
fn merge_credentials(keys: impl Iterator<Item = String>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for key in keys {
        let key = key.trim();
        if key.is_empty() || merged.iter().any(|k| k == key) {
            continue;
        }
        merged.push(key.to_string());
    }
    merged
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
