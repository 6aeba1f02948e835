//! Narration producer: one synthesis call for the whole script.
//!
//! # Call policy
//!
//! ```text
//! gate.acquire()                       ← process-wide minimum spacing
//! synthesize(text)
//!   ├─ Ok                              → audio
//!   ├─ QuotaExceeded { Some(hint) }    → sleep(hint), retry exactly once
//!   ├─ QuotaExceeded { None }          → QuotaExhausted (caller must wait)
//!   └─ other error                     → Service error, no retry
//! ```

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::NarrationConfig;
use crate::narration::gate::CallSpacingGate;
use crate::narration::service::{NarrationAudio, NarrationService, NarrationServiceError};
use crate::progress::{ProgressPublisher, Stage};

#[derive(Debug, Error)]
pub enum NarrationError {
    #[error(
        "Narration API quota exceeded. You may have reached your daily or per-minute limit; \
         please wait a few minutes and try again."
    )]
    QuotaExhausted,

    #[error("Narration API error: {0}")]
    Service(#[source] NarrationServiceError),
}

pub struct NarrationProducer {
    service: Arc<dyn NarrationService>,
    gate: CallSpacingGate,
}

impl NarrationProducer {
    pub fn new(service: Arc<dyn NarrationService>, min_spacing: Duration) -> Self {
        Self {
            service,
            gate: CallSpacingGate::new(min_spacing),
        }
    }

    pub fn from_config(service: Arc<dyn NarrationService>, config: &NarrationConfig) -> Self {
        Self::new(service, config.min_call_spacing())
    }

    pub fn gate(&self) -> &CallSpacingGate {
        &self.gate
    }

    /// Synthesise `text`, honouring the call spacing and the retry-after
    /// policy described in the module docs.
    pub async fn produce(
        &self,
        text: &str,
        progress: &ProgressPublisher,
    ) -> Result<NarrationAudio, NarrationError> {
        let pending = self.gate.pending_wait().await;
        if !pending.is_zero() {
            progress.note(
                Stage::Audio,
                format!(
                    "Rate limiting: waiting {}s before next narration call...",
                    pending.as_secs_f64().ceil() as u64
                ),
            );
        }
        let waited = self.gate.acquire().await;
        if !waited.is_zero() {
            log::debug!("narration: waited {:.1}s for call spacing", waited.as_secs_f64());
        }

        match self.service.synthesize(text).await {
            Ok(audio) => Ok(audio),
            Err(NarrationServiceError::QuotaExceeded {
                retry_after: Some(hint),
            }) => {
                log::warn!(
                    "narration: rate limited, retrying once in {:.1}s",
                    hint.as_secs_f64()
                );
                progress.note(
                    Stage::Audio,
                    format!(
                        "Hit rate limit. Waiting {}s before retry...",
                        hint.as_secs_f64().ceil() as u64
                    ),
                );
                tokio::time::sleep(hint).await;
                self.gate.mark().await;

                match self.service.synthesize(text).await {
                    Ok(audio) => Ok(audio),
                    Err(NarrationServiceError::QuotaExceeded { .. }) => {
                        Err(NarrationError::QuotaExhausted)
                    }
                    Err(e) => Err(NarrationError::Service(e)),
                }
            }
            Err(NarrationServiceError::QuotaExceeded { retry_after: None }) => {
                log::error!("narration: quota exceeded with no retry hint");
                Err(NarrationError::QuotaExhausted)
            }
            Err(e) => Err(NarrationError::Service(e)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    pub(crate) enum Reply {
        Audio(f64),
        /// Audio without alignment data, so no duration.
        Unaligned,
        Quota(Option<Duration>),
        Fail,
    }

    /// Replays scripted replies and records each call's text.
    pub(crate) struct ScriptedNarrationService {
        replies: Mutex<VecDeque<Reply>>,
        pub(crate) texts: Mutex<Vec<String>>,
    }

    impl ScriptedNarrationService {
        pub(crate) fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                texts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.texts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl NarrationService for ScriptedNarrationService {
        async fn synthesize(&self, text: &str) -> Result<NarrationAudio, NarrationServiceError> {
            self.texts.lock().unwrap().push(text.to_string());
            match self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Fail) {
                Reply::Audio(secs) => Ok(NarrationAudio {
                    bytes: b"ID3fake-mp3".to_vec(),
                    duration_secs: Some(secs),
                }),
                Reply::Unaligned => Ok(NarrationAudio {
                    bytes: b"ID3fake-mp3".to_vec(),
                    duration_secs: None,
                }),
                Reply::Quota(retry_after) => {
                    Err(NarrationServiceError::QuotaExceeded { retry_after })
                }
                Reply::Fail => Err(NarrationServiceError::Api {
                    status: 500,
                    message: "tts down".into(),
                }),
            }
        }
    }

    fn producer(replies: Vec<Reply>) -> (NarrationProducer, Arc<ScriptedNarrationService>) {
        let service = Arc::new(ScriptedNarrationService::new(replies));
        (NarrationProducer::new(service.clone(), Duration::ZERO), service)
    }

    #[tokio::test]
    async fn single_call_on_success() {
        let (producer, service) = producer(vec![Reply::Audio(3.0)]);
        let audio = producer
            .produce("A stickman waves. He walks away", &ProgressPublisher::detached())
            .await
            .unwrap();
        assert_eq!(audio.duration_secs, Some(3.0));
        assert_eq!(service.calls(), 1);
        assert_eq!(service.texts.lock().unwrap()[0], "A stickman waves. He walks away");
    }

    #[tokio::test]
    async fn retry_after_hint_retries_exactly_once() {
        let (producer, service) = producer(vec![
            Reply::Quota(Some(Duration::from_millis(30))),
            Reply::Audio(2.0),
        ]);
        let started = Instant::now();
        let audio = producer.produce("x", &ProgressPublisher::detached()).await.unwrap();
        assert_eq!(audio.duration_secs, Some(2.0));
        assert_eq!(service.calls(), 2);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn second_quota_after_retry_is_exhaustion() {
        let (producer, service) = producer(vec![
            Reply::Quota(Some(Duration::ZERO)),
            Reply::Quota(Some(Duration::ZERO)),
            Reply::Audio(1.0),
        ]);
        let err = producer.produce("x", &ProgressPublisher::detached()).await.unwrap_err();
        assert!(matches!(err, NarrationError::QuotaExhausted));
        assert_eq!(service.calls(), 2);
    }

    #[tokio::test]
    async fn quota_without_hint_is_not_retried() {
        let (producer, service) = producer(vec![Reply::Quota(None), Reply::Audio(1.0)]);
        let err = producer.produce("x", &ProgressPublisher::detached()).await.unwrap_err();
        assert!(matches!(err, NarrationError::QuotaExhausted));
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn other_failures_are_not_retried() {
        let (producer, service) = producer(vec![Reply::Fail, Reply::Audio(1.0)]);
        let err = producer.produce("x", &ProgressPublisher::detached()).await.unwrap_err();
        assert!(matches!(err, NarrationError::Service(_)));
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn back_to_back_calls_respect_spacing() {
        let service = Arc::new(ScriptedNarrationService::new(vec![
            Reply::Audio(1.0),
            Reply::Audio(1.0),
        ]));
        let producer = NarrationProducer::new(service, Duration::from_millis(60));
        let (progress, mut stream) = ProgressPublisher::new(8);

        producer.produce("first", &progress).await.unwrap();
        let started = Instant::now();
        producer.produce("second", &progress).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));

        drop(progress);
        let notes = stream.collect_until_terminal().await;
        assert_eq!(notes.len(), 1, "one rate-limit note for the second call");
    }
}
