//! Narration synthesis.
//!
//! This module provides:
//! * [`NarrationService`]: async trait for the external text-to-speech service.
//! * [`ElevenLabsService`]: ElevenLabs `with-timestamps` backend.
//! * [`CallSpacingGate`]: process-wide minimum spacing between calls.
//! * [`NarrationProducer`]: gate + one-shot retry-after policy around the
//!   service.
//!
//! The whole script is narrated in a single call; the text is the script's
//! lines joined as sentences (see [`crate::script::Script::narration_text`]).

pub mod gate;
pub mod producer;
pub mod service;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use gate::CallSpacingGate;
pub use producer::{NarrationError, NarrationProducer};
pub use service::{ElevenLabsService, NarrationAudio, NarrationService, NarrationServiceError};
