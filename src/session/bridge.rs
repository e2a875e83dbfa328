// SPDX-License-Identifier: GPL-3.0-only

//! Remote session bridge
//!
//! Runs on the primary device. Creates a session, exposes its join URL and
//! polls the backend for results submitted from the second device.
//!
//! Polling may observe the same completed result several times, so every
//! applied `result_id` is remembered and repeats are reported as duplicates.
//! The set survives session renewal. A session the backend no longer
//! accepts (403 or 404) is never retried; a new one is minted instead.

use super::types::RemoteSession;
use crate::backends::recognition::{Recognition, ScanBackend, SessionPoll};
use crate::config::SessionConfig;
use crate::constants::status;
use crate::errors::SessionError;
use crate::scanner::events::{CaptureOrigin, EventSender, ScanEvent};
use chrono::Utc;
use futures::Stream;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Result of one poll
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Nothing new yet
    Pending,
    /// A new result, applied exactly once
    Applied {
        result_id: String,
        recognition: Recognition,
    },
    /// A result that was already applied
    Duplicate { result_id: String },
    /// A session was started; `previous` is the one it replaces
    Renewed {
        previous: Option<String>,
        session: RemoteSession,
    },
}

/// Owns the polling schedule and the applied-result set
pub struct RemoteSessionBridge {
    backend: Arc<dyn ScanBackend>,
    config: SessionConfig,
    session: Option<RemoteSession>,
    applied: HashSet<String>,
}

impl RemoteSessionBridge {
    pub fn new(backend: Arc<dyn ScanBackend>, config: SessionConfig) -> Self {
        Self {
            backend,
            config,
            session: None,
            applied: HashSet::new(),
        }
    }

    /// Current session, if one was started
    pub fn session(&self) -> Option<&RemoteSession> {
        self.session.as_ref()
    }

    /// Join URL of the current session
    pub fn join_url(&self) -> Option<String> {
        self.session
            .as_ref()
            .map(|s| s.join_url(&self.config.join_url_base))
    }

    /// Whether `result_id` has already been applied
    pub fn is_applied(&self, result_id: &str) -> bool {
        self.applied.contains(result_id)
    }

    /// Create a new session, replacing any current one
    pub async fn start_session(&mut self) -> Result<RemoteSession, SessionError> {
        let id = self.backend.create_session().await?;
        let session = RemoteSession::new(id, Utc::now(), self.config.session_ttl());
        info!(
            session_id = %session.id,
            expires_at = %session.expires_at,
            "Remote session started"
        );
        self.session = Some(session.clone());
        Ok(session)
    }

    /// Poll once, starting or renewing the session when needed
    pub async fn poll_once(&mut self) -> Result<PollOutcome, SessionError> {
        let Some(current) = self.session.as_ref() else {
            let session = self.start_session().await?;
            return Ok(PollOutcome::Renewed {
                previous: None,
                session,
            });
        };
        let session_id = current.id.clone();

        match self.backend.poll_session(&session_id).await {
            Ok(SessionPoll::Pending) => {
                trace!(session_id = %session_id, "No remote result yet");
                Ok(PollOutcome::Pending)
            }
            Ok(SessionPoll::Completed {
                result_id,
                recognition,
            }) => {
                if !self.applied.insert(result_id.clone()) {
                    trace!(result_id = %result_id, "Remote result already applied");
                    return Ok(PollOutcome::Duplicate { result_id });
                }
                debug!(session_id = %session_id, result_id = %result_id, "Remote result applied");
                if let Some(session) = self.session.as_mut() {
                    session.last_result_id = Some(result_id.clone());
                }
                Ok(PollOutcome::Applied {
                    result_id,
                    recognition,
                })
            }
            Err(e) if e.needs_new_session() => {
                warn!(session_id = %session_id, error = %e, "Remote session rejected, starting a new one");
                self.session = None;
                let session = self.start_session().await?;
                Ok(PollOutcome::Renewed {
                    previous: Some(session_id),
                    session,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Poll forever at the configured interval
    ///
    /// The first item is always the initial session (or its failure).
    pub fn into_stream(mut self) -> impl Stream<Item = Result<PollOutcome, SessionError>> + Send {
        let interval = self.config.poll_interval();
        async_stream::stream! {
            loop {
                yield self.poll_once().await;
                tokio::time::sleep(interval).await;
            }
        }
    }

    /// Run the bridge on the tokio runtime, reporting through `events`
    ///
    /// The task ends when the event receiver is dropped or the handle is.
    pub fn spawn(mut self, events: EventSender) -> BridgeHandle {
        let interval = self.config.poll_interval();
        let join_base = self.config.join_url_base.clone();

        let task = tokio::spawn(async move {
            loop {
                let had_session = self.session.is_some();
                let event = match self.poll_once().await {
                    Ok(PollOutcome::Pending) | Ok(PollOutcome::Duplicate { .. }) => None,
                    Ok(PollOutcome::Applied { recognition, .. }) => Some(match recognition {
                        Recognition::Match(card) => ScanEvent::Recognized {
                            origin: CaptureOrigin::Remote,
                            card,
                        },
                        Recognition::NoMatch => ScanEvent::NoMatch {
                            origin: CaptureOrigin::Remote,
                        },
                    }),
                    Ok(PollOutcome::Renewed {
                        previous: None,
                        session,
                    }) => Some(ScanEvent::SessionStarted {
                        join_url: session.join_url(&join_base),
                        session_id: session.id,
                    }),
                    Ok(PollOutcome::Renewed {
                        previous: Some(previous),
                        session,
                    }) => Some(ScanEvent::SessionRenewed {
                        previous,
                        join_url: session.join_url(&join_base),
                        session_id: session.id,
                    }),
                    Err(e) => {
                        warn!(error = %e, "Remote session poll failed");
                        let text = if had_session {
                            status::POLL_FAILED
                        } else {
                            status::SESSION_START_FAILED
                        };
                        Some(ScanEvent::SessionError(text.to_string()))
                    }
                };

                if let Some(event) = event
                    && events.unbounded_send(event).is_err()
                {
                    debug!("Event receiver dropped, stopping remote session bridge");
                    break;
                }
                if events.is_closed() {
                    break;
                }
                tokio::time::sleep(interval).await;
            }
        });

        BridgeHandle { task }
    }
}

/// Handle to a spawned bridge; dropping it stops polling
pub struct BridgeHandle {
    task: JoinHandle<()>,
}

impl BridgeHandle {
    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::recognition::EncodedImage;
    use crate::errors::RecognitionError;
    use futures::FutureExt;
    use futures::future::BoxFuture;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted poll answers; creates sessions s1, s2, ...
    #[derive(Default)]
    struct ScriptedBackend {
        polls: Mutex<VecDeque<Result<SessionPoll, SessionError>>>,
        created: Mutex<u32>,
        polled_ids: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn with_polls(polls: Vec<Result<SessionPoll, SessionError>>) -> Self {
            Self {
                polls: Mutex::new(polls.into()),
                ..Self::default()
            }
        }
    }

    impl ScanBackend for ScriptedBackend {
        fn recognize(&self, _image: EncodedImage) -> BoxFuture<'_, Result<Recognition, RecognitionError>> {
            async { Ok(Recognition::NoMatch) }.boxed()
        }

        fn create_session(&self) -> BoxFuture<'_, Result<String, RecognitionError>> {
            let mut created = self.created.lock().unwrap();
            *created += 1;
            let id = format!("s{}", *created);
            async move { Ok(id) }.boxed()
        }

        fn poll_session<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, Result<SessionPoll, SessionError>> {
            self.polled_ids.lock().unwrap().push(session_id.to_string());
            let next = self
                .polls
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(SessionPoll::Pending));
            async move { next }.boxed()
        }

        fn submit_to_session<'a>(
            &'a self,
            _session_id: &'a str,
            _image: EncodedImage,
        ) -> BoxFuture<'a, Result<(), SessionError>> {
            async { Ok(()) }.boxed()
        }
    }

    fn completed(id: &str) -> Result<SessionPoll, SessionError> {
        Ok(SessionPoll::Completed {
            result_id: id.to_string(),
            recognition: Recognition::NoMatch,
        })
    }

    #[tokio::test]
    async fn test_first_poll_starts_session() {
        let backend = Arc::new(ScriptedBackend::default());
        let mut bridge = RemoteSessionBridge::new(backend, SessionConfig::default());
        assert!(bridge.join_url().is_none());

        let outcome = bridge.poll_once().await.unwrap();
        let PollOutcome::Renewed { previous: None, session } = outcome.clone() else {
            panic!("expected a new session, got {:?}", outcome);
        };
        assert_eq!(session.id, "s1");
        assert_eq!(
            bridge.join_url().as_deref(),
            Some("http://localhost:5173/mobile-scan/s1")
        );
    }

    #[tokio::test]
    async fn test_repeated_result_is_applied_once() {
        let backend = Arc::new(ScriptedBackend::with_polls(vec![
            completed("r1"),
            completed("r1"),
            completed("r2"),
        ]));
        let mut bridge = RemoteSessionBridge::new(backend, SessionConfig::default());
        bridge.start_session().await.unwrap();

        let outcomes = [
            bridge.poll_once().await.unwrap(),
            bridge.poll_once().await.unwrap(),
            bridge.poll_once().await.unwrap(),
        ];
        assert!(matches!(&outcomes[0], PollOutcome::Applied { result_id, .. } if result_id == "r1"));
        assert!(matches!(&outcomes[1], PollOutcome::Duplicate { result_id } if result_id == "r1"));
        assert!(matches!(&outcomes[2], PollOutcome::Applied { result_id, .. } if result_id == "r2"));
        assert_eq!(
            bridge.session().and_then(|s| s.last_result_id.as_deref()),
            Some("r2")
        );
    }

    #[tokio::test]
    async fn test_expired_session_is_replaced() {
        let backend = Arc::new(ScriptedBackend::with_polls(vec![
            Err(SessionError::Expired {
                session_id: "s1".to_string(),
            }),
            Ok(SessionPoll::Pending),
        ]));
        let mut bridge = RemoteSessionBridge::new(backend.clone(), SessionConfig::default());
        bridge.start_session().await.unwrap();

        let outcome = bridge.poll_once().await.unwrap();
        assert!(matches!(
            &outcome,
            PollOutcome::Renewed { previous: Some(prev), session } if prev == "s1" && session.id == "s2"
        ));
        assert_eq!(bridge.poll_once().await.unwrap(), PollOutcome::Pending);
        assert_eq!(*backend.polled_ids.lock().unwrap(), vec!["s1", "s2"]);
    }

    #[tokio::test]
    async fn test_transport_error_keeps_session() {
        let backend = Arc::new(ScriptedBackend::with_polls(vec![Err(SessionError::Transport(
            RecognitionError::Network("connection reset".to_string()),
        ))]));
        let mut bridge = RemoteSessionBridge::new(backend, SessionConfig::default());
        bridge.start_session().await.unwrap();

        assert!(bridge.poll_once().await.is_err());
        assert_eq!(bridge.session().map(|s| s.id.as_str()), Some("s1"));
    }

    #[tokio::test]
    async fn test_applied_ids_survive_renewal() {
        let backend = Arc::new(ScriptedBackend::with_polls(vec![
            completed("r1"),
            Err(SessionError::NotFound {
                session_id: "s1".to_string(),
            }),
            completed("r1"),
        ]));
        let mut bridge = RemoteSessionBridge::new(backend, SessionConfig::default());
        bridge.start_session().await.unwrap();

        assert!(matches!(bridge.poll_once().await.unwrap(), PollOutcome::Applied { .. }));
        assert!(matches!(bridge.poll_once().await.unwrap(), PollOutcome::Renewed { .. }));
        assert!(matches!(bridge.poll_once().await.unwrap(), PollOutcome::Duplicate { .. }));
        assert!(bridge.is_applied("r1"));
    }
}
