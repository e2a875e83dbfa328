// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the remote session bridge

mod common;

use card_scanner::backends::recognition::{Recognition, SessionPoll};
use card_scanner::collection::ScanLog;
use card_scanner::config::SessionConfig;
use card_scanner::errors::SessionError;
use card_scanner::scanner::{CaptureOrigin, ScanEvent, event_channel};
use card_scanner::session::{PollOutcome, RemoteSessionBridge};
use chrono::Utc;
use common::{FakeBackend, card};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

fn fast_config() -> SessionConfig {
    SessionConfig {
        poll_interval_ms: 5,
        join_url_base: "https://scan.example".to_string(),
        ..SessionConfig::default()
    }
}

fn completed(result_id: &str, name: &str) -> Result<SessionPoll, SessionError> {
    Ok(SessionPoll::Completed {
        result_id: result_id.to_string(),
        recognition: Recognition::Match(card(name, name)),
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn test_spawned_bridge_reports_each_result_once() {
    let backend = Arc::new(FakeBackend::new(Recognition::NoMatch).with_polls(vec![
        completed("r1", "Forest"),
        completed("r1", "Forest"),
        Err(SessionError::Expired {
            session_id: "session-1".to_string(),
        }),
        completed("r2", "Island"),
        completed("r2", "Island"),
    ]));

    let (sender, mut receiver) = event_channel();
    let handle = RemoteSessionBridge::new(backend.clone(), fast_config()).spawn(sender);

    let mut events = Vec::new();
    while events.len() < 4 {
        match tokio::time::timeout(Duration::from_secs(5), receiver.next()).await {
            Ok(Some(event)) => events.push(event),
            other => panic!("bridge stopped early: {:?}", other.map(|e| e.is_some())),
        }
    }
    // Give any duplicate a chance to show up
    tokio::time::sleep(Duration::from_millis(100)).await;
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(10), receiver.next()).await {
        events.push(event);
    }
    drop(handle);

    assert_eq!(events.len(), 4, "unexpected events: {:?}", events);
    assert!(matches!(
        &events[0],
        ScanEvent::SessionStarted { session_id, join_url }
            if session_id == "session-1" && join_url == "https://scan.example/mobile-scan/session-1"
    ));
    assert!(matches!(
        &events[1],
        ScanEvent::Recognized { origin: CaptureOrigin::Remote, card } if card.name == "Forest"
    ));
    assert!(matches!(
        &events[2],
        ScanEvent::SessionRenewed { previous, session_id, .. }
            if previous == "session-1" && session_id == "session-2"
    ));
    assert!(matches!(
        &events[3],
        ScanEvent::Recognized { card, .. } if card.name == "Island"
    ));
    assert_eq!(events[1].status_text(), "Scan received: Forest");
    assert_eq!(events[2].status_text(), "Session expired, starting a new one");

    let polled = backend.polled.lock().unwrap();
    assert_eq!(&polled[..3], &["session-1", "session-1", "session-1"]);
    assert!(
        polled[3..].iter().all(|id| id == "session-2"),
        "the expired session must not be polled again"
    );
}

#[tokio::test]
async fn test_stream_feeds_scan_log() {
    let backend = Arc::new(FakeBackend::new(Recognition::NoMatch).with_polls(vec![
        completed("r1", "Forest"),
        Ok(SessionPoll::Pending),
        completed("r2", "Forest"),
        completed("r2", "Forest"),
    ]));
    let bridge = RemoteSessionBridge::new(backend, fast_config());
    let mut stream = Box::pin(bridge.into_stream());

    let mut log = ScanLog::new();
    let mut duplicates = 0;
    for _ in 0..6 {
        match stream.next().await {
            Some(Ok(PollOutcome::Applied {
                recognition: Recognition::Match(card),
                ..
            })) => {
                log.apply(&card, Utc::now());
            }
            Some(Ok(PollOutcome::Duplicate { .. })) => duplicates += 1,
            Some(Ok(_)) => {}
            other => panic!("unexpected stream item: {:?}", other),
        }
    }

    assert_eq!(duplicates, 1);
    assert_eq!(log.len(), 1);
    assert_eq!(log.get("Forest").map(|r| r.quantity), Some(2));
}

#[tokio::test]
async fn test_poll_failure_is_reported() {
    let backend = Arc::new(FakeBackend::new(Recognition::NoMatch).with_polls(vec![Err(
        SessionError::Transport(card_scanner::RecognitionError::Network("offline".to_string())),
    )]));

    let (sender, mut receiver) = event_channel();
    let _handle = RemoteSessionBridge::new(backend, fast_config()).spawn(sender);

    let first = receiver.next().await;
    assert!(matches!(first, Some(ScanEvent::SessionStarted { .. })));
    let second = receiver.next().await;
    assert!(
        matches!(&second, Some(ScanEvent::SessionError(text)) if text == "Error polling scan result"),
        "got {:?}",
        second
    );
}
