//! Progress publishing for pipeline runs.
//!
//! The orchestrator reports `(stage, percent, message)` after each sub-step
//! through a [`ProgressPublisher`].  Listeners hold a [`ProgressStream`].
//!
//! # Delivery policy
//!
//! Events travel over a bounded `tokio::sync::broadcast` channel:
//!
//! * publishing never blocks and never fails: with no listener the event is
//!   simply dropped;
//! * a listener that falls behind loses the **oldest** buffered events and
//!   resumes with the newest ones, so the terminal event is always kept;
//! * within one stage the published percent never decreases.
//!
//! ```rust
//! use stickman_studio::progress::{ProgressPublisher, RunUpdate, Stage};
//!
//! # #[tokio::main] async fn main() {
//! let (publisher, mut stream) = ProgressPublisher::new(16);
//! publisher.publish(Stage::Images, 0.0, "Generating stickman images...");
//! drop(publisher);
//!
//! match stream.next().await {
//!     Some(RunUpdate::Progress { data }) => assert_eq!(data.stage, Stage::Images),
//!     other => panic!("unexpected {other:?}"),
//! }
//! assert!(stream.next().await.is_none());
//! # }
//! ```

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::pipeline::RunResult;

/// Buffered events per listener before the oldest start being dropped.
pub const DEFAULT_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Stage / ProgressEvent
// ---------------------------------------------------------------------------

/// Coarse pipeline stage reported to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Images,
    Audio,
    Video,
    Complete,
}

/// One progress report.  `percent` is clamped to `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    #[serde(rename = "progress")]
    pub percent: f32,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(stage: Stage, percent: f32, message: impl Into<String>) -> Self {
        Self {
            stage,
            percent: if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) },
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// RunUpdate
// ---------------------------------------------------------------------------

/// Everything a listener can observe: progress, then exactly one terminal
/// `Complete` or `Error`.
///
/// Serialises as `{"type":"progress","data":{..}}`,
/// `{"type":"complete","data":{"videoUrl":..,"duration":..}}` or
/// `{"type":"error","message":..}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RunUpdate {
    Progress { data: ProgressEvent },
    Complete { data: RunResult },
    Error { message: String },
}

impl RunUpdate {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunUpdate::Progress { .. })
    }
}

// ---------------------------------------------------------------------------
// ProgressPublisher
// ---------------------------------------------------------------------------

/// Fire-and-forget sink for run updates.  Cheap to clone.
#[derive(Debug, Clone)]
pub struct ProgressPublisher {
    tx: broadcast::Sender<RunUpdate>,
    last: Arc<Mutex<Option<(Stage, f32)>>>,
}

impl ProgressPublisher {
    /// Create a publisher together with its first listener.
    pub fn new(capacity: usize) -> (Self, ProgressStream) {
        let (tx, rx) = broadcast::channel(capacity.max(1));
        let publisher = Self {
            tx,
            last: Arc::new(Mutex::new(None)),
        };
        (publisher, ProgressStream { rx })
    }

    /// A publisher nobody listens to.
    pub fn detached() -> Self {
        Self::new(1).0
    }

    /// Attach another listener.  It only sees events published from now on.
    pub fn subscribe(&self) -> ProgressStream {
        ProgressStream {
            rx: self.tx.subscribe(),
        }
    }

    /// Publish a progress event.  Never blocks; silently dropped when no
    /// listener is attached.
    pub fn publish(&self, stage: Stage, percent: f32, message: impl Into<String>) {
        let mut event = ProgressEvent::new(stage, percent, message);
        {
            let mut last = self.last.lock().unwrap();
            if let Some((last_stage, last_percent)) = *last {
                if last_stage == stage && event.percent < last_percent {
                    event.percent = last_percent;
                }
            }
            *last = Some((stage, event.percent));
        }
        log::debug!(
            "progress: [{:?} {:>5.1}%] {}",
            event.stage,
            event.percent,
            event.message
        );
        self.send(RunUpdate::Progress { data: event });
    }

    /// Informational message in `stage` at the last percent reported for it.
    pub fn note(&self, stage: Stage, message: impl Into<String>) {
        let percent = match *self.last.lock().unwrap() {
            Some((last_stage, percent)) if last_stage == stage => percent,
            _ => 0.0,
        };
        self.publish(stage, percent, message);
    }

    /// Publish the terminal update of a run.
    pub(crate) fn finish(&self, update: RunUpdate) {
        debug_assert!(update.is_terminal());
        self.send(update);
    }

    fn send(&self, update: RunUpdate) {
        // Err only means "no receivers"; progress is best-effort.
        let _ = self.tx.send(update);
    }
}

// ---------------------------------------------------------------------------
// ProgressStream
// ---------------------------------------------------------------------------

/// Listener side of a [`ProgressPublisher`].
#[derive(Debug)]
pub struct ProgressStream {
    rx: broadcast::Receiver<RunUpdate>,
}

impl ProgressStream {
    /// Next update, or `None` once every publisher is gone and the buffer is
    /// drained.  Events lost to lagging are skipped with a warning.
    pub async fn next(&mut self) -> Option<RunUpdate> {
        loop {
            match self.rx.recv().await {
                Ok(update) => return Some(update),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    log::warn!("progress: listener lagged, dropped {missed} oldest event(s)");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Drain updates until the terminal one (inclusive) or channel close.
    pub async fn collect_until_terminal(&mut self) -> Vec<RunUpdate> {
        let mut updates = Vec::new();
        while let Some(update) = self.next().await {
            let terminal = update.is_terminal();
            updates.push(update);
            if terminal {
                break;
            }
        }
        updates
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(update: &RunUpdate) -> &ProgressEvent {
        match update {
            RunUpdate::Progress { data } => data,
            other => panic!("expected progress, got {other:?}"),
        }
    }

    // ---- ProgressEvent ---

    #[test]
    fn percent_is_clamped() {
        assert_eq!(ProgressEvent::new(Stage::Images, -5.0, "").percent, 0.0);
        assert_eq!(ProgressEvent::new(Stage::Images, 150.0, "").percent, 100.0);
        assert_eq!(ProgressEvent::new(Stage::Images, f32::NAN, "").percent, 0.0);
    }

    #[test]
    fn stages_are_ordered() {
        assert!(Stage::Images < Stage::Audio);
        assert!(Stage::Audio < Stage::Video);
        assert!(Stage::Video < Stage::Complete);
    }

    // ---- serialisation ---

    #[test]
    fn progress_serialises_in_wire_shape() {
        let update = RunUpdate::Progress {
            data: ProgressEvent::new(Stage::Audio, 100.0, "Audio generated successfully"),
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "progress",
                "data": { "stage": "audio", "progress": 100.0, "message": "Audio generated successfully" }
            })
        );
    }

    #[test]
    fn error_serialises_with_message() {
        let update = RunUpdate::Error {
            message: "Script is empty".into(),
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({ "type": "error", "message": "Script is empty" })
        );
    }

    // ---- publisher ---

    #[test]
    fn publishing_without_listeners_is_harmless() {
        let publisher = ProgressPublisher::detached();
        for i in 0..1_000 {
            publisher.publish(Stage::Images, i as f32 / 10.0, "tick");
        }
        publisher.finish(RunUpdate::Error {
            message: "x".into(),
        });
    }

    #[tokio::test]
    async fn percent_never_decreases_within_a_stage() {
        let (publisher, mut stream) = ProgressPublisher::new(16);
        publisher.publish(Stage::Images, 50.0, "half");
        publisher.publish(Stage::Images, 25.0, "late report");
        publisher.publish(Stage::Audio, 0.0, "next stage starts at zero");
        drop(publisher);

        let updates = stream.collect_until_terminal().await;
        let percents: Vec<f32> = updates.iter().map(|u| progress(u).percent).collect();
        assert_eq!(percents, vec![50.0, 50.0, 0.0]);
    }

    #[tokio::test]
    async fn note_reuses_last_percent_of_stage() {
        let (publisher, mut stream) = ProgressPublisher::new(16);
        publisher.publish(Stage::Images, 25.0, "one");
        publisher.note(Stage::Images, "quota hit");
        publisher.note(Stage::Audio, "rate limited");
        drop(publisher);

        let updates = stream.collect_until_terminal().await;
        assert_eq!(progress(&updates[1]).percent, 25.0);
        assert_eq!(progress(&updates[1]).message, "quota hit");
        assert_eq!(progress(&updates[2]).stage, Stage::Audio);
        assert_eq!(progress(&updates[2]).percent, 0.0);
    }

    #[tokio::test]
    async fn slow_listener_drops_oldest_but_keeps_terminal() {
        let (publisher, mut stream) = ProgressPublisher::new(4);
        for i in 0..20 {
            publisher.publish(Stage::Images, i as f32, format!("step {i}"));
        }
        publisher.finish(RunUpdate::Error {
            message: "boom".into(),
        });

        let updates = stream.collect_until_terminal().await;
        assert!(updates.len() <= 4);
        assert_eq!(
            updates.last(),
            Some(&RunUpdate::Error {
                message: "boom".into()
            })
        );
        // survivors are the newest events
        assert_eq!(progress(&updates[0]).message, "step 17");
    }

    #[tokio::test]
    async fn stream_ends_when_publisher_dropped() {
        let (publisher, mut stream) = ProgressPublisher::new(4);
        drop(publisher);
        assert!(stream.next().await.is_none());
    }
}
