//! Narrated stickman video generation.
//!
//! A line-based script is cut into four-line paragraphs, each paragraph
//! becomes one four-panel composite image, the whole script is narrated in
//! one text-to-speech call, and ffmpeg stitches the frames and the narration
//! into an MP4.  See [`pipeline`] for the entry point.

pub mod config;
pub mod credentials;
pub mod image;
pub mod narration;
pub mod pipeline;
pub mod progress;
pub mod script;
pub mod timing;
pub mod video;
