//! Scene image generation.
//!
//! This module provides:
//! * [`SceneImageService`]: async trait for the external image service.
//! * [`GeminiImageService`]: Generative Language API backend.
//! * [`PanelPromptBuilder`]: builds the N-panel comic-strip prompt.
//! * [`SceneImageProducer`]: stagger, quota backoff and credential rotation
//!   around the service, then [`split_into_panels`] to cut frames.
//!
//! # Flow
//!
//! ```text
//! Paragraph ──▶ SceneImageProducer::produce(ctx, i, paragraph)
//!                 ├─ CredentialPool::next()       (ctx, run-scoped cursor)
//!                 ├─ SceneImageService::generate  (one call in flight)
//!                 ├─ write paragraph_{i}.png      (ctx scratch dir)
//!                 └─ split_into_panels            (spawn_blocking)
//!                       └─▶ frame_{n}.png × 4     (ctx frame counter)
//! ```

pub mod panels;
pub mod producer;
pub mod prompt;
pub mod service;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use panels::{split_into_panels, PanelError};
pub use producer::{ImageError, RetryPolicy, SceneImageProducer};
pub use prompt::PanelPromptBuilder;
pub use service::{CompositeImage, GeminiImageService, ImageServiceError, SceneImageService};
