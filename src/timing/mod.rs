//! Frame timing.
//!
//! Every frame is shown for the same time: the narration duration divided
//! by the number of frames.  There is no per-scene weighting and no attempt
//! to align panels with sentence boundaries.
//!
//! ```rust
//! use stickman_studio::timing::{assign_durations, duration_per_frame};
//! use std::path::PathBuf;
//!
//! assert_eq!(duration_per_frame(3.0, 4).unwrap(), 0.75);
//!
//! let frames: Vec<PathBuf> = (0..4).map(|i| format!("frame_{i}.png").into()).collect();
//! let timed = assign_durations(frames, 3.0).unwrap();
//! let total: f64 = timed.iter().map(|f| f.duration_secs).sum();
//! assert!((total - 3.0).abs() < 1e-9);
//! ```

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimingError {
    #[error("cannot time an empty frame sequence")]
    NoFrames,

    #[error("narration duration must be positive and finite, got {0}")]
    InvalidDuration(f64),
}

/// One frame of the final slideshow and how long it stays on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedFrame {
    pub path: PathBuf,
    pub duration_secs: f64,
}

/// `total_secs / frame_count`, real-valued.
pub fn duration_per_frame(total_secs: f64, frame_count: usize) -> Result<f64, TimingError> {
    if frame_count == 0 {
        return Err(TimingError::NoFrames);
    }
    if !total_secs.is_finite() || total_secs <= 0.0 {
        return Err(TimingError::InvalidDuration(total_secs));
    }
    Ok(total_secs / frame_count as f64)
}

/// Give every frame the same share of `total_secs`, preserving order.
pub fn assign_durations(
    frames: Vec<PathBuf>,
    total_secs: f64,
) -> Result<Vec<TimedFrame>, TimingError> {
    let each = duration_per_frame(total_secs, frames.len())?;
    Ok(frames
        .into_iter()
        .map(|path| TimedFrame {
            path,
            duration_secs: each,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("frame_{i}.png"))).collect()
    }

    #[test]
    fn uniform_share_for_uneven_division() {
        let timed = assign_durations(frames(12), 10.0).unwrap();
        let expected = 10.0 / 12.0;
        assert!(timed
            .iter()
            .all(|f| (f.duration_secs - expected).abs() < 1e-12));
        let total: f64 = timed.iter().map(|f| f.duration_secs).sum();
        assert!((total - 10.0).abs() < 1e-9);
    }

    #[test]
    fn order_is_preserved() {
        let timed = assign_durations(frames(3), 1.5).unwrap();
        let names: Vec<_> = timed.iter().map(|f| f.path.clone()).collect();
        assert_eq!(names, frames(3));
    }

    #[test]
    fn zero_frames_is_an_error() {
        assert_eq!(duration_per_frame(3.0, 0), Err(TimingError::NoFrames));
    }

    #[test]
    fn non_positive_or_nan_duration_is_an_error() {
        assert!(duration_per_frame(0.0, 4).is_err());
        assert!(duration_per_frame(-1.0, 4).is_err());
        assert!(duration_per_frame(f64::NAN, 4).is_err());
        assert!(duration_per_frame(f64::INFINITY, 4).is_err());
    }
}
