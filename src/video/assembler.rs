//! Video assembler: timed frames + narration → one MP4.
//!
//! Two transcoder passes:
//!
//! ```text
//! frames ──render_slideshow──▶ {work}/video_only.mp4 ──mux(+audio)──▶ output
//! ```
//!
//! The silent intermediate is deleted whether or not the mux succeeds, and a
//! partial output is deleted when either pass fails.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::timing::TimedFrame;
use crate::video::scratch::ScopedFiles;
use crate::video::transcoder::{RenderSettings, Transcoder, TranscoderError};

const SILENT_VIDEO_NAME: &str = "video_only.mp4";

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("no frames to assemble")]
    NoFrames,

    #[error("narration audio is missing: {0}")]
    MissingAudio(PathBuf),

    #[error(transparent)]
    Transcoder(#[from] TranscoderError),

    #[error("transcoder worker failed: {0}")]
    Worker(String),
}

pub struct VideoAssembler {
    transcoder: Arc<dyn Transcoder>,
    settings: RenderSettings,
}

impl VideoAssembler {
    pub fn new(transcoder: Arc<dyn Transcoder>, settings: RenderSettings) -> Self {
        Self {
            transcoder,
            settings,
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Render `frames`, mux `audio` over them and write `output`.
    ///
    /// `work_dir` holds the silent intermediate.  Nothing but `output`
    /// remains on success; nothing at all remains on failure.
    pub async fn assemble(
        &self,
        frames: Vec<TimedFrame>,
        audio: &Path,
        work_dir: &Path,
        output: &Path,
    ) -> Result<(), AssembleError> {
        if frames.is_empty() {
            return Err(AssembleError::NoFrames);
        }
        if !audio.is_file() {
            return Err(AssembleError::MissingAudio(audio.to_path_buf()));
        }

        let mut scope = ScopedFiles::new();
        let silent = scope.track(work_dir.join(SILENT_VIDEO_NAME));
        let output = scope.track(output);

        log::info!(
            "video: rendering {} frames at {}x{}",
            frames.len(),
            self.settings.width,
            self.settings.height
        );
        {
            let transcoder = Arc::clone(&self.transcoder);
            let settings = self.settings.clone();
            let silent = silent.clone();
            self.blocking(move || transcoder.render_slideshow(&frames, &settings, &silent))
                .await?;
        }

        log::info!("video: muxing narration into {}", output.display());
        {
            let transcoder = Arc::clone(&self.transcoder);
            let audio = audio.to_path_buf();
            let (silent, output) = (silent.clone(), output.clone());
            self.blocking(move || transcoder.mux(&silent, &audio, &output))
                .await?;
        }

        scope.release(&output);
        Ok(())
    }

    /// Container duration of `media`, run off the async runtime.
    pub async fn probe_duration(&self, media: &Path) -> Result<f64, AssembleError> {
        let transcoder = Arc::clone(&self.transcoder);
        let media = media.to_path_buf();
        self.blocking(move || transcoder.probe_duration(&media)).await
    }

    async fn blocking<T, F>(&self, job: F) -> Result<T, AssembleError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, TranscoderError> + Send + 'static,
    {
        tokio::task::spawn_blocking(job)
            .await
            .map_err(|e| AssembleError::Worker(e.to_string()))?
            .map_err(AssembleError::from)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Writes placeholder files instead of running ffmpeg and records what
    /// it was asked to render.
    #[derive(Default)]
    pub(crate) struct FakeTranscoder {
        pub(crate) rendered: Mutex<Vec<Vec<TimedFrame>>>,
        pub(crate) muxed: Mutex<Vec<(PathBuf, PathBuf)>>,
        pub(crate) fail_render: bool,
        pub(crate) fail_mux: bool,
        pub(crate) probe_secs: Option<f64>,
    }

    impl FakeTranscoder {
        pub(crate) fn failing_mux() -> Self {
            Self {
                fail_mux: true,
                ..Self::default()
            }
        }

        fn failure(program: &str) -> TranscoderError {
            TranscoderError::Failed {
                program: program.into(),
                status: Some(1),
                stderr: "Invalid data found when processing input".into(),
            }
        }
    }

    impl Transcoder for FakeTranscoder {
        fn render_slideshow(
            &self,
            frames: &[TimedFrame],
            _settings: &RenderSettings,
            output: &Path,
        ) -> Result<(), TranscoderError> {
            self.rendered.lock().unwrap().push(frames.to_vec());
            std::fs::write(output, b"silent")?;
            if self.fail_render {
                return Err(Self::failure("ffmpeg"));
            }
            Ok(())
        }

        fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), TranscoderError> {
            self.muxed
                .lock()
                .unwrap()
                .push((video.to_path_buf(), audio.to_path_buf()));
            std::fs::write(output, b"partial")?;
            if self.fail_mux {
                return Err(Self::failure("ffmpeg"));
            }
            Ok(())
        }

        fn probe_duration(&self, _media: &Path) -> Result<f64, TranscoderError> {
            self.probe_secs.ok_or_else(|| TranscoderError::Probe {
                program: "ffprobe".into(),
                output: String::new(),
            })
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        frames: Vec<TimedFrame>,
        audio: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let frames = (0..4)
            .map(|i| {
                let path = dir.path().join(format!("frame_{i}.png"));
                std::fs::write(&path, b"png").unwrap();
                TimedFrame {
                    path,
                    duration_secs: 0.75,
                }
            })
            .collect();
        let audio = dir.path().join("audio.mp3");
        std::fs::write(&audio, b"mp3").unwrap();
        Fixture { dir, frames, audio }
    }

    #[tokio::test]
    async fn success_leaves_only_the_output() {
        let fx = fixture();
        let fake = Arc::new(FakeTranscoder::default());
        let assembler = VideoAssembler::new(fake.clone(), RenderSettings::default());
        let out = fx.dir.path().join("video_1.mp4");

        assembler
            .assemble(fx.frames.clone(), &fx.audio, fx.dir.path(), &out)
            .await
            .unwrap();

        assert!(out.exists());
        assert!(!fx.dir.path().join(SILENT_VIDEO_NAME).exists());
        let rendered = fake.rendered.lock().unwrap();
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0], fx.frames);
        let muxed = fake.muxed.lock().unwrap();
        assert_eq!(muxed[0].1, fx.audio);
    }

    #[tokio::test]
    async fn mux_failure_removes_intermediate_and_partial_output() {
        let fx = fixture();
        let assembler =
            VideoAssembler::new(Arc::new(FakeTranscoder::failing_mux()), RenderSettings::default());
        let out = fx.dir.path().join("video_1.mp4");

        let err = assembler
            .assemble(fx.frames.clone(), &fx.audio, fx.dir.path(), &out)
            .await
            .unwrap_err();

        match err {
            AssembleError::Transcoder(TranscoderError::Failed { stderr, .. }) => {
                assert!(stderr.contains("Invalid data"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!out.exists());
        assert!(!fx.dir.path().join(SILENT_VIDEO_NAME).exists());
    }

    #[tokio::test]
    async fn render_failure_skips_mux() {
        let fx = fixture();
        let fake = Arc::new(FakeTranscoder {
            fail_render: true,
            ..FakeTranscoder::default()
        });
        let assembler = VideoAssembler::new(fake.clone(), RenderSettings::default());
        let out = fx.dir.path().join("video_1.mp4");

        assert!(assembler
            .assemble(fx.frames.clone(), &fx.audio, fx.dir.path(), &out)
            .await
            .is_err());
        assert!(fake.muxed.lock().unwrap().is_empty());
        assert!(!fx.dir.path().join(SILENT_VIDEO_NAME).exists());
    }

    #[tokio::test]
    async fn empty_frames_or_missing_audio_are_rejected_up_front() {
        let fx = fixture();
        let fake = Arc::new(FakeTranscoder::default());
        let assembler = VideoAssembler::new(fake.clone(), RenderSettings::default());
        let out = fx.dir.path().join("v.mp4");

        let err = assembler
            .assemble(Vec::new(), &fx.audio, fx.dir.path(), &out)
            .await
            .unwrap_err();
        assert!(matches!(err, AssembleError::NoFrames));

        let err = assembler
            .assemble(fx.frames.clone(), &fx.dir.path().join("nope.mp3"), fx.dir.path(), &out)
            .await
            .unwrap_err();
        assert!(matches!(err, AssembleError::MissingAudio(_)));
        assert!(fake.rendered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn probe_runs_through_the_transcoder() {
        let fake = Arc::new(FakeTranscoder {
            probe_secs: Some(4.2),
            ..FakeTranscoder::default()
        });
        let assembler = VideoAssembler::new(fake, RenderSettings::default());
        assert_eq!(
            assembler.probe_duration(Path::new("audio.mp3")).await.unwrap(),
            4.2
        );
    }
}
