// SPDX-License-Identifier: GPL-3.0-only

//! Card scanning pipeline
//!
//! ```text
//! FrameSource ──► CaptureLoop ──► FramePreprocessor ──► DetectionWorker
//!                     ▲                                      │
//!                     └──── GeometryValidator ◄── reply ─────┘
//!                                  │
//!                             FocusScorer ──► TemporalVoter ──► RecognitionClient
//! ```
//!
//! The capture loop runs on its own thread and never waits on the detection
//! worker; at most one detection request is outstanding per session.

pub mod capture_loop;
pub mod client;
pub mod detector;
pub mod events;
pub mod focus;
pub mod geometry;
pub mod manual;
pub mod preprocess;
pub mod session;
pub mod throttle;
pub mod types;
pub mod voting;

pub use capture_loop::{CaptureLoop, CaptureLoopBuilder, LoopAction, ManualTrigger, SubmitTarget};
pub use client::{RecognitionClient, encode_jpeg};
pub use detector::{
    DetectionReply, DetectionRequest, DetectionWorker, KeypointModel, ModelLoader, ReplayModel,
};
pub use events::{CaptureOrigin, EventReceiver, EventSender, ScanEvent, event_channel};
pub use focus::FocusScorer;
pub use geometry::GeometryValidator;
pub use manual::ManualCapture;
pub use preprocess::{FramePreprocessor, PreprocessedTile, TileTransform};
pub use session::{CycleReport, FrameDecision, ScanSession, Snapshot};
pub use throttle::FrameThrottle;
pub use types::{CropRect, DetectionResult, Keypoint, Point, Quad, ValidationOutcome};
pub use voting::{TemporalVoter, Trigger, VoterState};
