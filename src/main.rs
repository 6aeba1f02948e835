//! Application entry point: stickman video generator CLI.
//!
//! # Startup sequence
//!
//! 1. Parse command-line arguments.
//! 2. Initialise logging.  `--init-config` writes a default settings file
//!    and exits here.
//! 3. Load [`AppConfig`] (explicit `--config` file, else the platform
//!    `settings.toml`, else defaults).
//! 4. Create the [`tokio`] runtime.
//! 5. Build the orchestrator from config (fails fast on missing keys).
//! 6. Submit the script and print every update as one JSON line on stdout.
//! 7. Exit non-zero when the run failed.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use stickman_studio::{
    config::{AppConfig, AppPaths},
    pipeline::PipelineOrchestrator,
    progress::RunUpdate,
};

#[derive(Debug, Parser)]
#[command(name = "stickman-studio", version, about = "Turn a script into a narrated stickman video")]
struct Cli {
    /// Script file, one scene per line (`-` reads stdin).
    #[arg(short, long, required_unless_present = "init_config")]
    script: Option<PathBuf>,

    /// Settings file overriding the platform default location.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a settings file with default values (to `--config` if given)
    /// and exit.
    #[arg(long)]
    init_config: bool,
}

fn read_script(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read script from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))
}

/// Write default settings to `path` (or the platform location).  An
/// existing file is left alone.
fn init_config(path: Option<&Path>) -> Result<PathBuf> {
    let target = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppPaths::new().settings_file);
    if target.exists() {
        bail!("{} already exists", target.display());
    }
    match path {
        Some(p) => AppConfig::default().save_to(p)?,
        None => AppConfig::default().save()?,
    }
    Ok(target)
}

fn load_config(path: Option<&Path>) -> AppConfig {
    let loaded = match path {
        Some(p) => AppConfig::load_from(p),
        None => AppConfig::load(),
    };
    loaded.unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    })
}

async fn generate(config: AppConfig, script: String) -> Result<bool> {
    let orchestrator = Arc::new(PipelineOrchestrator::from_config(&config)?);
    let mut run = orchestrator.submit(script);

    let mut succeeded = false;
    while let Some(update) = run.events.next().await {
        println!("{}", serde_json::to_string(&update)?);
        if update.is_terminal() {
            succeeded = matches!(update, RunUpdate::Complete { .. });
            break;
        }
    }

    // a panicked run task never sends its terminal event
    Ok(succeeded && run.wait().await.is_ok())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // 1. Logging (stderr; stdout carries the JSON event stream)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("stickman-studio starting up");

    if cli.init_config {
        return match init_config(cli.config.as_deref()) {
            Ok(path) => {
                log::info!("wrote default settings to {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                log::error!("{e:#}");
                ExitCode::FAILURE
            }
        };
    }
    let Some(script_path) = cli.script else {
        log::error!("--script is required");
        return ExitCode::FAILURE;
    };

    // 2. Configuration
    let config = load_config(cli.config.as_deref());

    // 3. Tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = read_script(&script_path).and_then(|script| rt.block_on(generate(config, script)));
    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{e:#}");
            let message = RunUpdate::Error {
                message: e.to_string(),
            };
            if let Ok(line) = serde_json::to_string(&message) {
                println!("{line}");
            }
            ExitCode::FAILURE
        }
    }
}
