//! Transcoder trait and the ffmpeg/ffprobe implementation.
//!
//! [`Transcoder`] is synchronous: each method blocks on an external process.
//! The assembler runs it on `tokio::task::spawn_blocking` so the async
//! runtime never stalls.

use std::ffi::OsString;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;

use crate::config::VideoConfig;
use crate::timing::TimedFrame;

/// Keep at most this much of a failing tool's stderr.
const MAX_DIAGNOSTIC_CHARS: usize = 4_000;

// ---------------------------------------------------------------------------
// TranscoderError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TranscoderError {
    /// The executable could not be started (missing, not executable, ...).
    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran and exited unsuccessfully.
    #[error("{program} exited with status {}: {stderr}", .status.map_or("signal".to_string(), |c| c.to_string()))]
    Failed {
        program: String,
        status: Option<i32>,
        stderr: String,
    },

    /// ffprobe output was not a duration.
    #[error("could not read media duration from {program} output {output:?}")]
    Probe { program: String, output: String },

    #[error("I/O error preparing transcoder input: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// RenderSettings
// ---------------------------------------------------------------------------

/// Geometry of the rendered slideshow.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub pad_color: String,
}

impl RenderSettings {
    pub fn from_config(config: &VideoConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            fps: config.fps,
            pad_color: config.pad_color.clone(),
        }
    }

    /// Fixed frame rate, then scale to fit and pad to the exact target size
    /// so the source aspect ratio is preserved.
    pub fn filter(&self) -> String {
        format!(
            "fps={fps},scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:-1:-1:color={pad}",
            fps = self.fps,
            w = self.width,
            h = self.height,
            pad = self.pad_color,
        )
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::from_config(&VideoConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Transcoder trait
// ---------------------------------------------------------------------------

pub trait Transcoder: Send + Sync {
    /// Render `frames` in order, each for its duration, into a silent video.
    fn render_slideshow(
        &self,
        frames: &[TimedFrame],
        settings: &RenderSettings,
        output: &Path,
    ) -> Result<(), TranscoderError>;

    /// Copy the video stream, re-encode `audio`, stop at the shorter stream.
    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), TranscoderError>;

    /// Container duration of `media` in seconds.
    fn probe_duration(&self, media: &Path) -> Result<f64, TranscoderError>;
}

// Compile-time assertion: Box<dyn Transcoder> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Transcoder>) {}
};

// ---------------------------------------------------------------------------
// FfmpegTranscoder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn from_config(config: &VideoConfig) -> Self {
        Self::new(config.ffmpeg_path.clone(), config.ffprobe_path.clone())
    }

    fn run(&self, program: &str, args: &[OsString]) -> Result<String, TranscoderError> {
        log::debug!("video: running {program} {args:?}");
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| TranscoderError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(TranscoderError::Failed {
                program: program.to_string(),
                status: output.status.code(),
                stderr: diagnostic_tail(&String::from_utf8_lossy(&output.stderr)),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Transcoder for FfmpegTranscoder {
    fn render_slideshow(
        &self,
        frames: &[TimedFrame],
        settings: &RenderSettings,
        output: &Path,
    ) -> Result<(), TranscoderError> {
        // the concat demuxer resolves relative entries against the list's
        // own directory, so hand it absolute paths
        let absolute: Vec<TimedFrame> = frames
            .iter()
            .map(|f| {
                Ok(TimedFrame {
                    path: std::fs::canonicalize(&f.path)?,
                    duration_secs: f.duration_secs,
                })
            })
            .collect::<Result<_, std::io::Error>>()?;

        let list_path = output.with_extension("concat.txt");
        std::fs::write(&list_path, concat_list(&absolute))?;

        let result = self.run(&self.ffmpeg, &render_args(&list_path, settings, output));
        let _ = std::fs::remove_file(&list_path);
        result.map(|_| ())
    }

    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), TranscoderError> {
        self.run(&self.ffmpeg, &mux_args(video, audio, output))
            .map(|_| ())
    }

    fn probe_duration(&self, media: &Path) -> Result<f64, TranscoderError> {
        let stdout = self.run(&self.ffprobe, &probe_args(media))?;
        stdout
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|d| d.is_finite() && *d > 0.0)
            .ok_or_else(|| TranscoderError::Probe {
                program: self.ffprobe.clone(),
                output: stdout.trim().to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Argument builders
// ---------------------------------------------------------------------------

fn quiet_overwrite() -> Vec<OsString> {
    ["-y", "-hide_banner", "-loglevel", "error"]
        .iter()
        .map(OsString::from)
        .collect()
}

pub(crate) fn render_args(list: &Path, settings: &RenderSettings, output: &Path) -> Vec<OsString> {
    let mut args = quiet_overwrite();
    args.extend(
        ["-f", "concat", "-safe", "0", "-i"]
            .iter()
            .map(OsString::from),
    );
    args.push(list.into());
    args.push("-vf".into());
    args.push(settings.filter().into());
    args.extend(
        ["-c:v", "libx264", "-pix_fmt", "yuv420p"]
            .iter()
            .map(OsString::from),
    );
    args.push(output.into());
    args
}

pub(crate) fn mux_args(video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
    let mut args = quiet_overwrite();
    args.push("-i".into());
    args.push(video.into());
    args.push("-i".into());
    args.push(audio.into());
    args.extend(
        ["-c:v", "copy", "-c:a", "aac", "-shortest"]
            .iter()
            .map(OsString::from),
    );
    args.push(output.into());
    args
}

pub(crate) fn probe_args(media: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(media.into());
    args
}

/// ffconcat list: one `file`/`duration` pair per frame.  The last file is
/// listed once more without a duration, otherwise the demuxer ignores the
/// final frame's duration.
pub fn concat_list(frames: &[TimedFrame]) -> String {
    let mut list = String::from("ffconcat version 1.0\n");
    for frame in frames {
        let _ = writeln!(list, "file '{}'", escape_concat_path(&frame.path));
        let _ = writeln!(list, "duration {:.6}", frame.duration_secs);
    }
    if let Some(last) = frames.last() {
        let _ = writeln!(list, "file '{}'", escape_concat_path(&last.path));
    }
    list
}

fn escape_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

fn diagnostic_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    let count = trimmed.chars().count();
    if count <= MAX_DIAGNOSTIC_CHARS {
        return trimmed.to_string();
    }
    trimmed.chars().skip(count - MAX_DIAGNOSTIC_CHARS).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
