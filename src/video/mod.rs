//! Video assembly.
//!
//! This module provides:
//! * [`Transcoder`]: blocking trait over the external encoder.
//! * [`FfmpegTranscoder`]: ffmpeg concat-demuxer slideshow, mux and ffprobe.
//! * [`VideoAssembler`]: async driver that runs the transcoder off the
//!   runtime and cleans up intermediates.

pub mod assembler;
pub mod scratch;
pub mod transcoder;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use assembler::{AssembleError, VideoAssembler};
pub use scratch::ScopedFiles;
pub use transcoder::{concat_list, FfmpegTranscoder, RenderSettings, Transcoder, TranscoderError};
