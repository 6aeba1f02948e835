//! Run-level error taxonomy.
//!
//! Every component error converts into exactly one [`PipelineError`]
//! category.  `Display` is the message shown to the caller in the terminal
//! error event.

use thiserror::Error;

use crate::credentials::CredentialError;
use crate::image::{ImageError, ImageServiceError};
use crate::narration::{NarrationError, NarrationServiceError};
use crate::pipeline::state::InvalidTransition;
use crate::progress::Stage;
use crate::script::ScriptError;
use crate::timing::TimingError;
use crate::video::{AssembleError, TranscoderError};

#[derive(Debug, Error)]
pub enum PipelineError {
    /// No usable credentials or missing settings.  Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The script had no usable lines.  No external call was made.
    #[error("Script is empty")]
    EmptyInput,

    /// A stage used up its retry budget; the caller has to wait.
    #[error("{message}")]
    QuotaExhausted { stage: Stage, message: String },

    /// The image service answered, but not with a usable image.
    #[error("{0}")]
    ImageGeneration(String),

    /// Non-quota collaborator failure.  Not retried.
    #[error("{message}")]
    TransientService { stage: Stage, message: String },

    /// The transcoder failed; `diagnostics` is its captured stderr.
    #[error("{program} failed: {diagnostics}")]
    ExternalProcess {
        program: String,
        diagnostics: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Stage the failure belongs to, when it is tied to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::QuotaExhausted { stage, .. }
            | PipelineError::TransientService { stage, .. } => Some(*stage),
            PipelineError::ImageGeneration(_) => Some(Stage::Images),
            PipelineError::ExternalProcess { .. } => Some(Stage::Video),
            _ => None,
        }
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, PipelineError::QuotaExhausted { .. })
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<ScriptError> for PipelineError {
    fn from(e: ScriptError) -> Self {
        match e {
            ScriptError::Empty => PipelineError::EmptyInput,
        }
    }
}

impl From<CredentialError> for PipelineError {
    fn from(e: CredentialError) -> Self {
        PipelineError::Configuration(e.to_string())
    }
}

impl From<ImageError> for PipelineError {
    fn from(e: ImageError) -> Self {
        match e {
            ImageError::QuotaExhausted { .. } => PipelineError::QuotaExhausted {
                stage: Stage::Images,
                message: e.to_string(),
            },
            ImageError::Service {
                source: ImageServiceError::NoImage | ImageServiceError::Parse(_),
                ..
            }
            | ImageError::Panels { .. } => PipelineError::ImageGeneration(e.to_string()),
            ImageError::Service { .. } => PipelineError::TransientService {
                stage: Stage::Images,
                message: e.to_string(),
            },
            ImageError::Io(io) => PipelineError::Io(io),
            ImageError::Worker(msg) => PipelineError::Internal(msg),
        }
    }
}

impl From<NarrationError> for PipelineError {
    fn from(e: NarrationError) -> Self {
        match e {
            NarrationError::QuotaExhausted
            | NarrationError::Service(NarrationServiceError::QuotaExceeded { .. }) => {
                PipelineError::QuotaExhausted {
                    stage: Stage::Audio,
                    message: NarrationError::QuotaExhausted.to_string(),
                }
            }
            NarrationError::Service(_) => PipelineError::TransientService {
                stage: Stage::Audio,
                message: e.to_string(),
            },
        }
    }
}

impl From<TimingError> for PipelineError {
    fn from(e: TimingError) -> Self {
        match e {
            // the narration service reported an unusable length
            TimingError::InvalidDuration(_) => PipelineError::TransientService {
                stage: Stage::Audio,
                message: e.to_string(),
            },
            TimingError::NoFrames => PipelineError::Internal(e.to_string()),
        }
    }
}

impl From<InvalidTransition> for PipelineError {
    fn from(e: InvalidTransition) -> Self {
        PipelineError::Internal(e.to_string())
    }
}

impl From<TranscoderError> for PipelineError {
    fn from(e: TranscoderError) -> Self {
        match e {
            TranscoderError::Failed {
                program, stderr, ..
            } => PipelineError::ExternalProcess {
                program,
                diagnostics: stderr,
            },
            TranscoderError::Spawn { program, source } => PipelineError::ExternalProcess {
                program,
                diagnostics: source.to_string(),
            },
            TranscoderError::Probe { program, output } => PipelineError::ExternalProcess {
                program,
                diagnostics: format!("unreadable duration {output:?}"),
            },
            TranscoderError::Io(io) => PipelineError::Io(io),
        }
    }
}

impl From<AssembleError> for PipelineError {
    fn from(e: AssembleError) -> Self {
        match e {
            AssembleError::Transcoder(t) => t.into(),
            AssembleError::NoFrames | AssembleError::MissingAudio(_) | AssembleError::Worker(_) => {
                PipelineError::Internal(e.to_string())
            }
        }
    }
}
