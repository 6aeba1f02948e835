//! Run state machine.
//!
//! [`PipelineState`] names the phase a run is in; [`StateMachine`] enforces
//! the legal transitions and keeps the visited history for diagnostics.

use std::fmt;

use thiserror::Error;

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// States of a single generation run.
///
/// The state machine transitions are:
///
/// ```text
/// Idle ──submit──▶ Segmenting
///      ──paragraphs ready──▶ GeneratingImages
///      ──all paragraphs done──▶ GeneratingAudio
///      ──narration written──▶ Assembling
///      ──video muxed──▶ Complete
/// any non-terminal state ──unrecoverable error──▶ Failed
/// ```
///
/// `Complete` and `Failed` are final; a run is never retried as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// Created, nothing submitted yet.
    #[default]
    Idle,

    /// Splitting the script into paragraphs.
    Segmenting,

    /// One image call per paragraph, strictly in order.
    GeneratingImages,

    /// Single narration call for the whole script.
    GeneratingAudio,

    /// Transcoder is rendering and muxing.
    Assembling,

    /// Output video written.
    Complete,

    /// Run aborted; scratch files are cleaned up.
    Failed,
}

impl PipelineState {
    /// Returns `true` while the run is doing work.
    ///
    /// ```
    /// use stickman_studio::pipeline::PipelineState;
    ///
    /// assert!(!PipelineState::Idle.is_busy());
    /// assert!(PipelineState::GeneratingImages.is_busy());
    /// assert!(!PipelineState::Complete.is_busy());
    /// assert!(!PipelineState::Failed.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            PipelineState::Segmenting
                | PipelineState::GeneratingImages
                | PipelineState::GeneratingAudio
                | PipelineState::Assembling
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Complete | PipelineState::Failed)
    }

    /// Short human-readable label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Idle => "Idle",
            PipelineState::Segmenting => "Segmenting",
            PipelineState::GeneratingImages => "Generating images",
            PipelineState::GeneratingAudio => "Generating audio",
            PipelineState::Assembling => "Assembling",
            PipelineState::Complete => "Complete",
            PipelineState::Failed => "Failed",
        }
    }

    /// The single forward successor, if any.
    fn successor(&self) -> Option<PipelineState> {
        match self {
            PipelineState::Idle => Some(PipelineState::Segmenting),
            PipelineState::Segmenting => Some(PipelineState::GeneratingImages),
            PipelineState::GeneratingImages => Some(PipelineState::GeneratingAudio),
            PipelineState::GeneratingAudio => Some(PipelineState::Assembling),
            PipelineState::Assembling => Some(PipelineState::Complete),
            PipelineState::Complete | PipelineState::Failed => None,
        }
    }

    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == PipelineState::Failed || self.successor() == Some(next)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// StateMachine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal pipeline transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: PipelineState,
    pub to: PipelineState,
}

/// Current state plus every state visited, in order.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: PipelineState,
    history: Vec<PipelineState>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: PipelineState::Idle,
            history: vec![PipelineState::Idle],
        }
    }

    pub fn current(&self) -> PipelineState {
        self.current
    }

    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    pub fn advance(&mut self, next: PipelineState) -> Result<(), InvalidTransition> {
        if !self.current.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.current,
                to: next,
            });
        }
        log::debug!("pipeline: {} → {}", self.current, next);
        self.current = next;
        self.history.push(next);
        Ok(())
    }

    /// Move to `Failed`.  Returns `false` when the run was already terminal.
    pub fn fail(&mut self) -> bool {
        self.advance(PipelineState::Failed).is_ok()
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
