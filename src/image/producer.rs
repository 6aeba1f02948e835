//! Scene image producer: one composite per paragraph, cut into frames.
//!
//! # Call policy
//!
//! ```text
//! for attempt in 1..=pool.size():
//!     credential = pool.next()
//!     sleep(stagger_base + jitter)                 ← spread out bursts
//!     match service.generate(lines, credential):
//!         Success(img)   → split into frames, done
//!         QuotaExceeded  → sleep(quota_backoff + jitter), next attempt
//!         Error(e)       → fail immediately, no retry
//! all attempts quota-limited → QuotaExhausted
//! ```
//!
//! Frames are numbered by the run-scoped counter in [`RunContext`], so
//! concurrent runs never collide on file names.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;

use crate::config::ImageConfig;
use crate::credentials::Credential;
use crate::image::panels::{extension_for_mime, split_into_panels, PanelError};
use crate::image::service::{CompositeImage, ImageServiceError, SceneImageService};
use crate::pipeline::RunContext;
use crate::progress::{ProgressPublisher, Stage};
use crate::script::Paragraph;

// ---------------------------------------------------------------------------
// ImageError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ImageError {
    /// Every credential in the pool answered with a quota signal.
    #[error(
        "Image API quota exceeded after trying all {attempts} API key(s). \
         Please wait and try again later."
    )]
    QuotaExhausted { attempts: usize },

    /// Non-quota service failure; not retried.
    #[error("Image generation error for paragraph {}: {source}", .paragraph + 1)]
    Service {
        paragraph: usize,
        #[source]
        source: ImageServiceError,
    },

    #[error("Could not split composite for paragraph {}: {source}", .paragraph + 1)]
    Panels {
        paragraph: usize,
        #[source]
        source: PanelError,
    },

    #[error("scratch I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("panel worker failed: {0}")]
    Worker(String),
}

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Delays applied around image-service calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub stagger_base: Duration,
    pub stagger_jitter: Duration,
    pub quota_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ImageConfig) -> Self {
        Self {
            stagger_base: config.stagger_base(),
            stagger_jitter: config.stagger_jitter(),
            quota_backoff: config.quota_backoff(),
        }
    }

    /// No waiting at all (tests, local fakes).
    pub fn immediate() -> Self {
        Self {
            stagger_base: Duration::ZERO,
            stagger_jitter: Duration::ZERO,
            quota_backoff: Duration::ZERO,
        }
    }

    /// `base` plus a uniformly random share of the jitter window.
    fn with_jitter(&self, base: Duration) -> Duration {
        let jitter_ms = self.stagger_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

// ---------------------------------------------------------------------------
// Attempt
// ---------------------------------------------------------------------------

/// Outcome of a single service call.
enum Attempt {
    Success(CompositeImage),
    QuotaExceeded,
    Error(ImageServiceError),
}

impl From<Result<CompositeImage, ImageServiceError>> for Attempt {
    fn from(result: Result<CompositeImage, ImageServiceError>) -> Self {
        match result {
            Ok(image) => Attempt::Success(image),
            Err(e) if e.is_quota() => Attempt::QuotaExceeded,
            Err(e) => Attempt::Error(e),
        }
    }
}

// ---------------------------------------------------------------------------
// SceneImageProducer
// ---------------------------------------------------------------------------

/// Turns paragraphs into ordered frame files.
pub struct SceneImageProducer {
    service: Arc<dyn SceneImageService>,
    policy: RetryPolicy,
}

impl SceneImageProducer {
    pub fn new(service: Arc<dyn SceneImageService>, policy: RetryPolicy) -> Self {
        Self { service, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Generate the composite for paragraph `index` and return its frame
    /// paths in left-to-right order.
    pub async fn produce(
        &self,
        ctx: &mut RunContext,
        index: usize,
        paragraph: &Paragraph,
        progress: &ProgressPublisher,
    ) -> Result<Vec<PathBuf>, ImageError> {
        let max_attempts = ctx.credentials().size();

        for attempt in 1..=max_attempts {
            let credential = ctx.credentials_mut().next();
            tokio::time::sleep(self.policy.with_jitter(self.policy.stagger_base)).await;

            match self.call(paragraph, &credential).await {
                Attempt::Success(composite) => {
                    return self.decompose(ctx, index, paragraph, composite).await;
                }
                Attempt::QuotaExceeded => {
                    log::warn!(
                        "image: quota hit on attempt {attempt}/{max_attempts} (key #{}), \
                         paragraph {}",
                        credential.index() + 1,
                        index + 1
                    );
                    if attempt < max_attempts {
                        progress.note(
                            Stage::Images,
                            format!(
                                "Quota hit, retrying paragraph {} with next API key ({}/{})",
                                index + 1,
                                attempt + 1,
                                max_attempts
                            ),
                        );
                        tokio::time::sleep(self.policy.with_jitter(self.policy.quota_backoff))
                            .await;
                    }
                }
                Attempt::Error(source) => {
                    log::error!("image: paragraph {} failed: {source}", index + 1);
                    return Err(ImageError::Service {
                        paragraph: index,
                        source,
                    });
                }
            }
        }

        Err(ImageError::QuotaExhausted {
            attempts: max_attempts,
        })
    }

    async fn call(&self, paragraph: &Paragraph, credential: &Credential) -> Attempt {
        self.service.generate(paragraph.lines(), credential).await.into()
    }

    /// Persist the composite, then cut it into `panel_count` frames.
    async fn decompose(
        &self,
        ctx: &mut RunContext,
        index: usize,
        paragraph: &Paragraph,
        composite: CompositeImage,
    ) -> Result<Vec<PathBuf>, ImageError> {
        let composite_path = ctx.scratch_path(&format!(
            "paragraph_{index}.{}",
            extension_for_mime(&composite.mime_type)
        ));
        tokio::fs::write(&composite_path, &composite.bytes).await?;
        log::info!(
            "image: {}-panel composite saved: {}",
            paragraph.panel_count(),
            composite_path.display()
        );

        let frame_paths: Vec<PathBuf> = (0..paragraph.panel_count())
            .map(|_| ctx.next_frame_path())
            .collect();

        let paths = frame_paths.clone();
        let bytes = composite.bytes;
        tokio::task::spawn_blocking(move || split_into_panels(&bytes, &paths))
            .await
            .map_err(|e| ImageError::Worker(e.to_string()))?
            .map_err(|source| ImageError::Panels {
                paragraph: index,
                source,
            })?;

        Ok(frame_paths)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
