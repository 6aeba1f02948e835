//! Location of the per-user settings file.
//!
//! Only the config directory is resolved here.  `settings.toml` is the one
//! file the tool keeps per user; rendered videos and run scratch space are
//! placed by [`OutputConfig`](super::OutputConfig), which defaults to paths
//! relative to the working directory so a server deployment controls them.
//!
//! | Platform | Settings file                                              |
//! |----------|------------------------------------------------------------|
//! | Linux    | `~/.config/stickman-studio/settings.toml`                  |
//! | macOS    | `~/Library/Application Support/stickman-studio/settings.toml` |
//! | Windows  | `%APPDATA%\stickman-studio\settings.toml`                  |

use std::path::{Path, PathBuf};

const APP_DIR: &str = "stickman-studio";
const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug, Clone)]
pub struct AppPaths {
    /// `<platform config dir>/stickman-studio`.
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
}

impl AppPaths {
    /// Resolve against the platform config directory, or the working
    /// directory when the platform has none.
    pub fn new() -> Self {
        Self::under(&dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Paths rooted at `base` instead of the platform directory.
    pub fn under(base: &Path) -> Self {
        let config_dir = base.join(APP_DIR);
        Self {
            settings_file: config_dir.join(SETTINGS_FILE),
            config_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
