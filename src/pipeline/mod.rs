//! Pipeline orchestrator module.
//!
//! This module sequences the whole script → images → narration → video run
//! and owns everything that is scoped to a single run.
//!
//! # Architecture
//!
//! ```text
//! PipelineOrchestrator::submit(script)      ← spawns one tokio task per run
//!        │
//!        ├─ RunContext     run id, credential cursor, frame counter, scratch dir
//!        ├─ StateMachine   Idle → … → Complete | Failed
//!        └─ ProgressPublisher ──broadcast──▶ ProgressStream (RunHandle::events)
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stickman_studio::config::AppConfig;
//! use stickman_studio::pipeline::PipelineOrchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load()?;
//!     let orchestrator = Arc::new(PipelineOrchestrator::from_config(&config)?);
//!
//!     let run = orchestrator.submit("A stickman waves.\nHe walks away.");
//!     let result = run.wait().await?;
//!     println!("{}", result.video_locator);
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod error;
pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use context::{RunContext, RunId};
pub use error::PipelineError;
pub use runner::{OutputLayout, PipelineOrchestrator, RunHandle, RunResult};
pub use state::{InvalidTransition, PipelineState, StateMachine};
