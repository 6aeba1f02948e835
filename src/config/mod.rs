//! Configuration module.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each external
//! collaborator, `AppPaths` for the platform config directory, and TOML
//! persistence via `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, ImageConfig, NarrationConfig, OutputConfig, VideoConfig, IMAGE_KEY_ENV_VARS,
    NARRATION_KEY_ENV_VAR,
};
