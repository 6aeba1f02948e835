//! Pipeline orchestrator: script in, narrated video out.
//!
//! [`PipelineOrchestrator`] owns the long-lived collaborators (credential
//! pool template, image and narration producers, video assembler).  Each
//! submission gets its own [`RunContext`] and [`ProgressPublisher`].
//!
//! # Pipeline flow
//!
//! ```text
//! submit(script)
//!   └─▶ Segmenting        Script::parse → paragraphs          (EmptyInput: no calls)
//!   └─▶ GeneratingImages  SceneImageProducer::produce × N     [images 0 → 100]
//!   └─▶ GeneratingAudio   NarrationProducer::produce → audio.mp3  [audio 0 → 100]
//!   └─▶ Assembling        assign_durations → VideoAssembler   [video 0 → 100]
//!   └─▶ Complete          {videoUrl, duration}                [complete 100]
//! any error ──▶ Failed: scratch removed, terminal error event
//! ```
//!
//! Transcoding runs on `tokio::task::spawn_blocking` inside the assembler so
//! the async runtime never stalls.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::{AppConfig, OutputConfig};
use crate::credentials::CredentialPool;
use crate::image::{GeminiImageService, RetryPolicy, SceneImageProducer};
use crate::narration::{ElevenLabsService, NarrationProducer};
use crate::progress::{ProgressPublisher, ProgressStream, RunUpdate, Stage, DEFAULT_CAPACITY};
use crate::script::Script;
use crate::timing::assign_durations;
use crate::video::{FfmpegTranscoder, RenderSettings, VideoAssembler};

use super::context::{RunContext, RunId};
use super::error::PipelineError;
use super::state::PipelineState;

const AUDIO_FILE_NAME: &str = "audio.mp3";

// ---------------------------------------------------------------------------
// RunResult
// ---------------------------------------------------------------------------

/// Outcome of a successful run.
///
/// Serialises as `{"videoUrl": .., "duration": ..}`; the local path and
/// frame count are for in-process callers only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    #[serde(rename = "videoUrl")]
    pub video_locator: String,
    #[serde(rename = "duration")]
    pub duration_secs: f64,
    #[serde(skip)]
    pub output_path: PathBuf,
    #[serde(skip)]
    pub frame_count: usize,
}

// ---------------------------------------------------------------------------
// OutputLayout
// ---------------------------------------------------------------------------

/// Where scratch and final files go, and how the final file is addressed.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub output_dir: PathBuf,
    pub public_prefix: String,
    pub scratch_root: PathBuf,
}

impl OutputLayout {
    pub fn from_config(config: &OutputConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            public_prefix: config.public_prefix.clone(),
            scratch_root: config.scratch_dir.clone(),
        }
    }

    /// `video_{start ms}_{short id}.mp4`, unique per run.
    fn file_name(run_id: &RunId) -> String {
        format!("video_{}_{}.mp4", run_id.timestamp_ms(), run_id.short())
    }

    fn locator(&self, file_name: &str) -> String {
        format!("{}/{file_name}", self.public_prefix.trim_end_matches('/'))
    }
}

// ---------------------------------------------------------------------------
// RunHandle
// ---------------------------------------------------------------------------

/// A submitted run: its event stream and its eventual result.
///
/// Dropping `events` does not stop the run.
pub struct RunHandle {
    pub events: ProgressStream,
    pub result: JoinHandle<Result<RunResult, PipelineError>>,
}

impl RunHandle {
    /// Wait for the run to finish, ignoring the event stream.
    pub async fn wait(self) -> Result<RunResult, PipelineError> {
        self.result
            .await
            .map_err(|e| PipelineError::Internal(e.to_string()))?
    }
}

// ---------------------------------------------------------------------------
// PipelineOrchestrator
// ---------------------------------------------------------------------------

/// Drives complete generation runs.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use stickman_studio::config::AppConfig;
/// use stickman_studio::pipeline::PipelineOrchestrator;
///
/// # async fn example() -> Result<(), stickman_studio::pipeline::PipelineError> {
/// let orchestrator = Arc::new(PipelineOrchestrator::from_config(&AppConfig::load().unwrap())?);
/// let mut run = orchestrator.submit("A stickman waves.\nHe walks away.");
/// while let Some(update) = run.events.next().await {
///     println!("{}", serde_json::to_string(&update).unwrap());
/// }
/// let result = run.wait().await?;
/// println!("video at {}", result.video_locator);
/// # Ok(())
/// # }
/// ```
pub struct PipelineOrchestrator {
    credentials: CredentialPool,
    images: SceneImageProducer,
    narration: NarrationProducer,
    assembler: VideoAssembler,
    output: OutputLayout,
    progress_capacity: usize,
}

impl PipelineOrchestrator {
    /// Assemble an orchestrator from already-built parts.
    ///
    /// # Arguments
    ///
    /// * `credentials`: image-service keys; every run starts from key 0.
    /// * `images`     : scene image producer (service + retry policy).
    /// * `narration`  : narration producer; its call-spacing gate is shared
    ///                   by every run of this orchestrator.
    /// * `assembler`  : video assembler around a transcoder.
    /// * `output`     : output and scratch locations.
    pub fn new(
        credentials: CredentialPool,
        images: SceneImageProducer,
        narration: NarrationProducer,
        assembler: VideoAssembler,
        output: OutputLayout,
    ) -> Self {
        Self {
            credentials,
            images,
            narration,
            assembler,
            output,
            progress_capacity: DEFAULT_CAPACITY,
        }
    }

    /// Wire the real HTTP services and ffmpeg from configuration.
    ///
    /// Fails with [`PipelineError::Configuration`] when no image key or no
    /// narration key is available.
    pub fn from_config(config: &AppConfig) -> Result<Self, PipelineError> {
        let credentials = CredentialPool::new(config.image_credentials())?;
        let narration_key = config.narration_credential().ok_or_else(|| {
            PipelineError::Configuration(
                "No narration API key found. Set ELEVENLABS_API_KEY or narration.api_key".into(),
            )
        })?;

        let images = SceneImageProducer::new(
            Arc::new(GeminiImageService::from_config(&config.image)),
            RetryPolicy::from_config(&config.image),
        );
        let narration = NarrationProducer::from_config(
            Arc::new(ElevenLabsService::from_config(&config.narration, narration_key)),
            &config.narration,
        );
        let assembler = VideoAssembler::new(
            Arc::new(FfmpegTranscoder::from_config(&config.video)),
            RenderSettings::from_config(&config.video),
        );

        Ok(Self::new(
            credentials,
            images,
            narration,
            assembler,
            OutputLayout::from_config(&config.output),
        ))
    }

    /// Buffered events per listener before the oldest are dropped.
    pub fn with_progress_capacity(mut self, capacity: usize) -> Self {
        self.progress_capacity = capacity;
        self
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Start a run on a tokio task.  The stream is subscribed before the run
    /// starts, so no event is missed.
    pub fn submit(self: &Arc<Self>, script: impl Into<String>) -> RunHandle {
        let (progress, events) = ProgressPublisher::new(self.progress_capacity);
        let this = Arc::clone(self);
        let script = script.into();
        let result = tokio::spawn(async move {
            // the body runs on its own task so a panic still ends in a
            // terminal error event
            let body = {
                let progress = progress.clone();
                tokio::spawn(async move { this.execute(&script, &progress).await })
            };
            let outcome = body.await.unwrap_or_else(|e| {
                Err(PipelineError::Internal(format!("run task failed: {e}")))
            });
            report(&outcome, &progress);
            outcome
        });
        RunHandle { events, result }
    }

    /// Execute one run to completion, publishing progress and exactly one
    /// terminal update on `progress`.
    pub async fn run(
        &self,
        script: &str,
        progress: &ProgressPublisher,
    ) -> Result<RunResult, PipelineError> {
        let outcome = self.execute(script, progress).await;
        report(&outcome, progress);
        outcome
    }

    // -----------------------------------------------------------------------
    // Run body
    // -----------------------------------------------------------------------

    async fn execute(
        &self,
        script: &str,
        progress: &ProgressPublisher,
    ) -> Result<RunResult, PipelineError> {
        let mut ctx = RunContext::create(&self.output.scratch_root, self.credentials.fresh())?;
        log::info!("pipeline: run {} started", ctx.run_id());

        let outcome = self.drive(&mut ctx, script, progress).await;
        if outcome.is_err() {
            ctx.state_mut().fail();
        }
        ctx.cleanup();
        outcome
    }

    async fn drive(
        &self,
        ctx: &mut RunContext,
        script: &str,
        progress: &ProgressPublisher,
    ) -> Result<RunResult, PipelineError> {
        // ── 1. Segmentation ─────────────────────────────────────────────
        ctx.state_mut().advance(PipelineState::Segmenting)?;
        let script = Script::parse(script)?;
        let paragraphs = script.paragraphs();
        log::info!(
            "pipeline: {} line(s) in {} paragraph(s)",
            script.len(),
            paragraphs.len()
        );

        // ── 2. Images, one paragraph at a time ──────────────────────────
        ctx.state_mut().advance(PipelineState::GeneratingImages)?;
        progress.publish(Stage::Images, 0.0, "Generating stickman images...");

        let total = paragraphs.len();
        let mut frames = Vec::new();
        for (i, paragraph) in paragraphs.iter().enumerate() {
            let paths = self.images.produce(ctx, i, paragraph, progress).await?;
            progress.publish(
                Stage::Images,
                (i + 1) as f32 / total as f32 * 100.0,
                format!("Generated paragraph {} of {} ({} frames)", i + 1, total, paths.len()),
            );
            frames.extend(paths);
        }

        // ── 3. Narration ────────────────────────────────────────────────
        ctx.state_mut().advance(PipelineState::GeneratingAudio)?;
        progress.publish(Stage::Audio, 0.0, "Converting script to speech...");

        let audio = self
            .narration
            .produce(&script.narration_text(), progress)
            .await?;
        let audio_path = ctx.scratch_path(AUDIO_FILE_NAME);
        tokio::fs::write(&audio_path, &audio.bytes).await?;

        let duration_secs = match audio.duration_secs {
            Some(secs) => secs,
            None => {
                log::debug!("pipeline: no duration from narration service, probing audio");
                self.assembler.probe_duration(&audio_path).await?
            }
        };
        progress.publish(Stage::Audio, 100.0, "Audio generated successfully");

        // ── 4. Assembly ─────────────────────────────────────────────────
        ctx.state_mut().advance(PipelineState::Assembling)?;
        progress.publish(Stage::Video, 0.0, "Stitching video together...");

        let timed = assign_durations(frames, duration_secs)?;
        let frame_count = timed.len();
        log::debug!(
            "pipeline: {frame_count} frames at {:.3}s each",
            duration_secs / frame_count as f64
        );

        tokio::fs::create_dir_all(&self.output.output_dir).await?;
        let file_name = OutputLayout::file_name(ctx.run_id());
        let output_path = self.output.output_dir.join(&file_name);
        self.assembler
            .assemble(timed, &audio_path, ctx.scratch_dir(), &output_path)
            .await?;
        progress.publish(Stage::Video, 100.0, "Video created successfully");

        // ── 5. Done ─────────────────────────────────────────────────────
        ctx.state_mut().advance(PipelineState::Complete)?;
        progress.publish(Stage::Complete, 100.0, "Video generation complete!");

        Ok(RunResult {
            video_locator: self.output.locator(&file_name),
            duration_secs,
            output_path,
            frame_count,
        })
    }
}

/// Log the outcome and publish the run's single terminal update.
fn report(outcome: &Result<RunResult, PipelineError>, progress: &ProgressPublisher) {
    match outcome {
        Ok(result) => {
            log::info!(
                "pipeline: run complete, {} frames, {:.2}s → {}",
                result.frame_count,
                result.duration_secs,
                result.output_path.display()
            );
            progress.finish(RunUpdate::Complete {
                data: result.clone(),
            });
        }
        Err(e) => {
            log::error!("pipeline error: {e}");
            progress.finish(RunUpdate::Error {
                message: e.to_string(),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
