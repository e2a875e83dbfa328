// SPDX-License-Identifier: GPL-3.0-only

//! Per-session scanning state
//!
//! [`ScanSession`] owns everything one scanning session mutates: throttle,
//! in-flight guard, voting window, cooldowns. It is driven synchronously by
//! the capture loop, which makes the ordering rules easy to test without
//! threads. Several sessions can run side by side without sharing state.

use super::detector::{DetectionReply, DetectionRequest};
use super::events::CaptureOrigin;
use super::focus::{FocusScorer, extract_region};
use super::geometry::GeometryValidator;
use super::manual::ManualCapture;
use super::preprocess::FramePreprocessor;
use super::throttle::FrameThrottle;
use super::types::{DetectionResult, Quad, ValidationOutcome};
use super::voting::TemporalVoter;
use crate::backends::camera::Frame;
use crate::config::ScannerConfig;
use crate::errors::CaptureError;
use image::RgbaImage;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// A full-resolution region ready for submission
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub image: Arc<RgbaImage>,
    pub origin: CaptureOrigin,
    /// Triggering quad, for automatic captures
    pub quad: Option<Quad>,
    pub taken_at: Instant,
}

/// What happened to an offered frame
#[derive(Debug)]
pub enum FrameDecision {
    /// Skipped by the sampling cadence
    Throttled,
    /// Dropped because a detection request is outstanding
    Busy,
    /// Send this request to the detection worker
    Dispatch(DetectionRequest),
}

/// Result of processing one detection reply
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub request_id: u64,
    pub outcome: ValidationOutcome,
    /// Present when this reply completed a quorum
    pub snapshot: Option<Snapshot>,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    id: u64,
    dispatched_at: Instant,
}

/// State machine of one scanning session
pub struct ScanSession {
    id: Uuid,
    preprocessor: FramePreprocessor,
    validator: GeometryValidator,
    scorer: FocusScorer,
    voter: TemporalVoter,
    throttle: FrameThrottle,
    manual: ManualCapture,
    reply_timeout: Duration,
    next_request_id: u64,
    in_flight: Option<InFlight>,
    closed: bool,
}

impl ScanSession {
    pub fn new(config: &ScannerConfig) -> Self {
        let id = Uuid::new_v4();
        info!(session = %id, "Scan session created");
        Self {
            id,
            preprocessor: FramePreprocessor::new(config.tile_size),
            validator: GeometryValidator::from_config(config),
            scorer: FocusScorer::from_config(config),
            voter: TemporalVoter::from_config(config),
            throttle: FrameThrottle::from_config(config),
            manual: ManualCapture::from_config(config),
            reply_timeout: config.reply_timeout(),
            next_request_id: 0,
            in_flight: None,
            closed: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn voter(&self) -> &TemporalVoter {
        &self.voter
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Offer a freshly captured frame
    ///
    /// At most one request is outstanding at a time. Frames arriving while a
    /// request is pending are dropped, not queued. A request that stays
    /// unanswered past the reply timeout is abandoned and its late reply will
    /// be ignored.
    pub fn offer_frame(&mut self, frame: Frame, now: Instant) -> Result<FrameDecision, CaptureError> {
        if self.closed {
            return Ok(FrameDecision::Throttled);
        }
        if frame.is_empty() {
            return Err(CaptureError::EmptyFrame {
                width: frame.width,
                height: frame.height,
            });
        }
        if !self.throttle.should_process(now) {
            return Ok(FrameDecision::Throttled);
        }

        if let Some(pending) = self.in_flight {
            if now.saturating_duration_since(pending.dispatched_at) < self.reply_timeout {
                trace!(pending = pending.id, "Detection in flight, dropping frame");
                return Ok(FrameDecision::Busy);
            }
            warn!(
                session = %self.id,
                request_id = pending.id,
                "Detection reply overdue, abandoning request"
            );
            self.in_flight = None;
        }

        let tile = self.preprocessor.preprocess(&frame)?;
        self.next_request_id += 1;
        let id = self.next_request_id;
        self.in_flight = Some(InFlight {
            id,
            dispatched_at: now,
        });
        Ok(FrameDecision::Dispatch(DetectionRequest { id, tile, frame }))
    }

    /// Gate a detection against the frame it was made on
    pub fn evaluate(&self, frame: &Frame, detection: &DetectionResult) -> ValidationOutcome {
        match self.validator.check(detection, frame.width, frame.height) {
            Ok(quad) => self.scorer.evaluate(&frame.image, &quad),
            Err(outcome) => outcome,
        }
    }

    /// Process a worker reply
    ///
    /// Replies that do not answer the outstanding request (abandoned or
    /// arriving after teardown) are ignored. A failed inference is skipped;
    /// a model load failure is returned as an error.
    pub fn handle_reply(
        &mut self,
        reply: DetectionReply,
        now: Instant,
    ) -> Result<Option<CycleReport>, CaptureError> {
        if self.closed {
            trace!(request_id = reply.id, "Reply after teardown ignored");
            return Ok(None);
        }
        match self.in_flight {
            Some(pending) if pending.id == reply.id => self.in_flight = None,
            _ => {
                debug!(request_id = reply.id, "Stale detection reply ignored");
                return Ok(None);
            }
        }

        let detection = match reply.result {
            Ok(detection) => detection,
            Err(e) if !e.is_fatal() => return Ok(None),
            Err(e) => return Err(e),
        };

        let outcome = self.evaluate(&reply.frame, &detection);
        let trigger = self.voter.record(outcome.is_valid(), now);

        let snapshot = match (trigger, outcome.quad()) {
            (Some(trigger), Some(quad)) => {
                extract_region(&reply.frame.image, quad).map(|region| {
                    info!(
                        session = %self.id,
                        valid_count = trigger.valid_count,
                        width = region.width(),
                        height = region.height(),
                        "Capture confirmed"
                    );
                    Snapshot {
                        image: Arc::new(region),
                        origin: CaptureOrigin::Auto,
                        quad: Some(*quad),
                        taken_at: now,
                    }
                })
            }
            _ => None,
        };

        Ok(Some(CycleReport {
            request_id: reply.id,
            outcome,
            snapshot,
        }))
    }

    /// Capture the fixed manual region, bypassing detection
    pub fn manual_capture(&mut self, frame: &Frame, now: Instant) -> Result<Option<Snapshot>, CaptureError> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.manual.capture(frame, now)?.map(|region| Snapshot {
            image: Arc::new(region),
            origin: CaptureOrigin::Manual,
            quad: None,
            taken_at: now,
        }))
    }

    /// End the session; any reply that arrives afterwards is a no-op
    pub fn teardown(&mut self) {
        if !self.closed {
            info!(session = %self.id, "Scan session closed");
        }
        self.closed = true;
        self.in_flight = None;
        self.voter.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::preprocess::TileTransform;
    use crate::scanner::types::{Keypoint, Point};
    use image::Rgba;

    const W: u32 = 320;
    const H: u32 = 240;

    fn config() -> ScannerConfig {
        ScannerConfig {
            skip_factor: 1,
            target_fps: 1000,
            tile_size: 64,
            ..ScannerConfig::default()
        }
    }

    fn sharp_frame() -> Frame {
        Frame::new(RgbaImage::from_fn(W, H, |x, y| {
            if ((x / 3) + (y / 3)) % 2 == 0 {
                Rgba([240, 240, 240, 255])
            } else {
                Rgba([15, 15, 15, 255])
            }
        }))
    }

    fn centered_card(confidences: [f64; 4], tile_size: u32) -> DetectionResult {
        let transform = TileTransform::for_frame(W, H, tile_size).unwrap();
        let corners = [
            Point::new(100.0, 40.0),
            Point::new(220.0, 40.0),
            Point::new(220.0, 200.0),
            Point::new(100.0, 200.0),
        ];
        let mut keypoints = [Keypoint::new(0.0, 0.0, 0.0); 4];
        for i in 0..4 {
            let p = transform.map(corners[i]);
            keypoints[i] = Keypoint::new(confidences[i], p.x, p.y);
        }
        DetectionResult {
            keypoints,
            transform,
        }
    }

    fn dispatch(session: &mut ScanSession, now: Instant) -> DetectionRequest {
        match session.offer_frame(sharp_frame(), now).unwrap() {
            FrameDecision::Dispatch(request) => request,
            other => panic!("expected dispatch, got {:?}", other),
        }
    }

    fn reply_for(request: DetectionRequest, confidences: [f64; 4]) -> DetectionReply {
        DetectionReply {
            id: request.id,
            result: Ok(centered_card(confidences, request.tile.transform.tile_size)),
            frame: request.frame,
        }
    }

    #[test]
    fn test_single_flight_under_flood() {
        let mut session = ScanSession::new(&config());
        let start = Instant::now();
        let mut dispatched = 0;
        for i in 0..500u64 {
            let now = start + Duration::from_millis(i * 2);
            if let FrameDecision::Dispatch(_) = session.offer_frame(sharp_frame(), now).unwrap() {
                dispatched += 1;
            }
        }
        assert_eq!(dispatched, 1);
        assert!(session.is_in_flight());
    }

    #[test]
    fn test_reply_frees_the_slot() {
        let mut session = ScanSession::new(&config());
        let start = Instant::now();
        let request = dispatch(&mut session, start);
        session
            .handle_reply(reply_for(request, [0.95; 4]), start)
            .unwrap();
        assert!(!session.is_in_flight());
        dispatch(&mut session, start + Duration::from_millis(5));
    }

    #[test]
    fn test_overdue_request_is_abandoned() {
        let mut session = ScanSession::new(&config());
        let start = Instant::now();
        let first = dispatch(&mut session, start);
        let second = dispatch(&mut session, start + Duration::from_secs(6));
        assert_ne!(first.id, second.id);

        // The late answer to the abandoned request changes nothing
        let report = session
            .handle_reply(reply_for(first, [0.95; 4]), start + Duration::from_secs(7))
            .unwrap();
        assert!(report.is_none());
        assert!(session.is_in_flight());
    }

    #[test]
    fn test_low_confidence_records_false() {
        let mut session = ScanSession::new(&config());
        let now = Instant::now();
        let request = dispatch(&mut session, now);
        let report = session
            .handle_reply(reply_for(request, [0.5, 0.9, 0.9, 0.9]), now)
            .unwrap()
            .unwrap();
        assert_eq!(
            report.outcome,
            ValidationOutcome::LowConfidence {
                min_confidence: 0.5
            }
        );
        assert!(report.snapshot.is_none());
        assert_eq!(session.voter().len(), 1);
        assert_eq!(session.voter().valid_count(), 0);
    }

    #[test]
    fn test_five_valid_replies_trigger_once() {
        let mut session = ScanSession::new(&config());
        let start = Instant::now();
        let mut snapshots = Vec::new();
        for i in 0..10u64 {
            let now = start + Duration::from_millis(i * 40);
            let request = dispatch(&mut session, now);
            let report = session
                .handle_reply(reply_for(request, [0.95; 4]), now)
                .unwrap()
                .unwrap();
            assert!(report.outcome.is_valid(), "{:?}", report.outcome);
            snapshots.extend(report.snapshot);
        }
        assert_eq!(snapshots.len(), 1);
        let snapshot = &snapshots[0];
        assert_eq!(snapshot.origin, CaptureOrigin::Auto);
        // Bounding box of the card, give or take rounding at the edges
        let (width, height) = snapshot.image.dimensions();
        assert!((119..=121).contains(&width), "width {}", width);
        assert!((159..=161).contains(&height), "height {}", height);
    }

    #[test]
    fn test_teardown_makes_late_reply_noop() {
        let mut session = ScanSession::new(&config());
        let now = Instant::now();
        let request = dispatch(&mut session, now);
        session.teardown();
        assert!(
            session
                .handle_reply(reply_for(request, [0.95; 4]), now)
                .unwrap()
                .is_none()
        );
        assert!(matches!(
            session.offer_frame(sharp_frame(), now).unwrap(),
            FrameDecision::Throttled
        ));
    }

    #[test]
    fn test_inference_error_is_skipped_but_load_error_is_fatal() {
        let mut session = ScanSession::new(&config());
        let now = Instant::now();

        let request = dispatch(&mut session, now);
        let reply = DetectionReply {
            id: request.id,
            frame: request.frame,
            result: Err(CaptureError::Inference("bad tensor".into())),
        };
        assert!(session.handle_reply(reply, now).unwrap().is_none());

        let request = dispatch(&mut session, now + Duration::from_millis(5));
        let reply = DetectionReply {
            id: request.id,
            frame: request.frame,
            result: Err(CaptureError::ModelUnavailable("gone".into())),
        };
        assert!(session.handle_reply(reply, now).is_err());
    }

    #[test]
    fn test_empty_frame_is_precondition_error() {
        let mut session = ScanSession::new(&config());
        let result = session.offer_frame(Frame::new(RgbaImage::new(0, 0)), Instant::now());
        assert!(matches!(result, Err(CaptureError::EmptyFrame { .. })));
    }

    #[test]
    fn test_manual_capture_bypasses_detection() {
        let mut session = ScanSession::new(&config());
        let snapshot = session
            .manual_capture(&sharp_frame(), Instant::now())
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.origin, CaptureOrigin::Manual);
        assert!(!session.is_in_flight());
        // 320x240 frame: minimum size is capped at the frame
        assert_eq!(snapshot.image.dimensions(), (280, 240));
    }
}
