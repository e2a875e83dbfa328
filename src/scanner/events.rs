// SPDX-License-Identifier: GPL-3.0-only

//! Events delivered to the UI collaborator

use crate::backends::recognition::RecognitionMatch;
use crate::constants::status;
use crate::errors::{CaptureError, RecognitionError, SessionError};
use futures::channel::mpsc;
use image::RgbaImage;
use std::sync::Arc;

/// Where a submitted capture came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOrigin {
    /// Confirmed by quorum voting
    Auto,
    /// User tapped capture
    Manual,
    /// Captured on a second device
    Remote,
}

/// Everything the pipeline reports to the surrounding application
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// Per-frame gating feedback
    Status(String),
    /// A region was captured and is about to be submitted
    Snapshot {
        origin: CaptureOrigin,
        image: Arc<RgbaImage>,
    },
    /// Capture was uploaded into a remote session
    RemoteSubmitted,
    /// Remote upload refused by the local cooldown
    RemoteCooldown,
    Recognized {
        origin: CaptureOrigin,
        card: RecognitionMatch,
    },
    NoMatch {
        origin: CaptureOrigin,
    },
    SubmitFailed {
        origin: CaptureOrigin,
        error: RecognitionError,
    },
    /// Upload into a remote session failed
    RemoteSubmitFailed(SessionError),
    /// A remote session is ready for the second device
    SessionStarted { session_id: String, join_url: String },
    /// The previous session expired and was replaced
    SessionRenewed {
        previous: String,
        session_id: String,
        join_url: String,
    },
    SessionError(String),
    /// The capture loop stopped because of a precondition failure
    Fatal(CaptureError),
    /// The capture loop exited
    Stopped,
}

impl ScanEvent {
    /// Status line shown for this event
    pub fn status_text(&self) -> String {
        match self {
            ScanEvent::Status(text) => text.clone(),
            ScanEvent::Snapshot { .. } => status::SNAPSHOT_TAKEN.to_string(),
            ScanEvent::RemoteSubmitted => status::REMOTE_SENT.to_string(),
            ScanEvent::RemoteCooldown => status::REMOTE_COOLDOWN.to_string(),
            ScanEvent::Recognized {
                origin: CaptureOrigin::Remote,
                card,
            } => format!("Scan received: {}", card.name),
            ScanEvent::Recognized { card, .. } => format!("Found {}", card.name),
            ScanEvent::NoMatch { .. } => status::NO_MATCH.to_string(),
            ScanEvent::SubmitFailed { .. } => status::BACKEND_ERROR.to_string(),
            ScanEvent::RemoteSubmitFailed(_) => status::REMOTE_UPLOAD_FAILED.to_string(),
            ScanEvent::SessionStarted { .. } => status::WAITING_FOR_REMOTE.to_string(),
            ScanEvent::SessionRenewed { .. } => status::SESSION_RENEWED.to_string(),
            ScanEvent::SessionError(text) => text.clone(),
            ScanEvent::Fatal(e) => e.to_string(),
            ScanEvent::Stopped => status::CAMERA_STOPPED.to_string(),
        }
    }
}

/// Sending half of the event stream
pub type EventSender = mpsc::UnboundedSender<ScanEvent>;

/// Receiving half of the event stream
pub type EventReceiver = mpsc::UnboundedReceiver<ScanEvent>;

/// Create an event channel
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded()
}
