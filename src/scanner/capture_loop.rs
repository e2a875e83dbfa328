// SPDX-License-Identifier: GPL-3.0-only
//! Capture loop thread
//!
//! Drives one [`ScanSession`] end to end: pulls frames from the source,
//! dispatches detection requests to the worker, processes replies, and hands
//! confirmed or manual captures to the recognition client on the async
//! runtime.
//!
//! The loop owns the frame source exclusively. Stopping the loop releases
//! the source and abandons outstanding work: the detection worker is
//! detached and in-flight network requests complete into the void.

use super::client::RecognitionClient;
use super::detector::{DetectionReply, DetectionWorker, ModelLoader};
use super::events::{EventSender, ScanEvent};
use super::session::{FrameDecision, ScanSession, Snapshot};
use crate::backends::camera::{Frame, FrameSource};
use crate::backends::recognition::Recognition;
use crate::config::ScannerConfig;
use crate::errors::CaptureError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, error, info, trace, warn};

/// Action returned by one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Where confirmed captures go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitTarget {
    /// Recognize directly (primary device)
    Recognize,
    /// Upload into a remote session (second device)
    RemoteSession(String),
}

/// Cloneable handle for requesting a manual capture
#[derive(Debug, Clone)]
pub struct ManualTrigger {
    tx: Sender<()>,
}

impl ManualTrigger {
    /// Request a capture of the latest frame; false once the loop is gone
    pub fn trigger(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

/// Sends snapshots to the backend without blocking the loop
struct Submitter {
    client: RecognitionClient,
    target: SubmitTarget,
    runtime: Handle,
    events: EventSender,
    /// Cleared on teardown; late results are dropped
    alive: Arc<AtomicBool>,
    remote_gap: Duration,
    last_remote_submit: Option<Instant>,
}

impl Submitter {
    fn submit(&mut self, snapshot: Snapshot) {
        let origin = snapshot.origin;

        if matches!(self.target, SubmitTarget::RemoteSession(_)) {
            if let Some(last) = self.last_remote_submit
                && snapshot.taken_at.saturating_duration_since(last) < self.remote_gap
            {
                debug!("Remote upload skipped during cooldown");
                let _ = self.events.unbounded_send(ScanEvent::RemoteCooldown);
                return;
            }
            self.last_remote_submit = Some(snapshot.taken_at);
        }

        let _ = self.events.unbounded_send(ScanEvent::Snapshot {
            origin,
            image: Arc::clone(&snapshot.image),
        });

        let client = self.client.clone();
        let events = self.events.clone();
        let alive = Arc::clone(&self.alive);
        let image = snapshot.image;

        match self.target.clone() {
            SubmitTarget::Recognize => {
                self.runtime.spawn(async move {
                    let result = client.submit(image).await;
                    if !alive.load(Ordering::SeqCst) {
                        debug!("Session closed, dropping recognition result");
                        return;
                    }
                    let event = match result {
                        Ok(Recognition::Match(card)) => ScanEvent::Recognized { origin, card },
                        Ok(Recognition::NoMatch) => ScanEvent::NoMatch { origin },
                        Err(error) => {
                            warn!(error = %error, "Recognition failed");
                            ScanEvent::SubmitFailed { origin, error }
                        }
                    };
                    let _ = events.unbounded_send(event);
                });
            }
            SubmitTarget::RemoteSession(session_id) => {
                self.runtime.spawn(async move {
                    let result = client.submit_to_session(&session_id, image).await;
                    if !alive.load(Ordering::SeqCst) {
                        debug!("Session closed, dropping upload result");
                        return;
                    }
                    let event = match result {
                        Ok(()) => ScanEvent::RemoteSubmitted,
                        Err(error) => {
                            warn!(error = %error, "Remote upload failed");
                            ScanEvent::RemoteSubmitFailed(error)
                        }
                    };
                    let _ = events.unbounded_send(event);
                });
            }
        }
    }
}

/// Everything the loop thread owns
struct LoopState {
    session: ScanSession,
    source: Box<dyn FrameSource>,
    worker: DetectionWorker,
    submitter: Submitter,
    events: EventSender,
    manual_rx: Receiver<()>,
    last_frame: Option<Frame>,
    source_ended: bool,
    reply_timeout: Duration,
}

impl LoopState {
    fn step(&mut self) -> LoopAction {
        // Replies first, so the in-flight slot frees up as early as possible
        loop {
            match self.worker.try_reply() {
                Ok(Some(reply)) => {
                    if let Err(e) = self.process_reply(reply) {
                        return self.fail(e);
                    }
                }
                Ok(None) => break,
                Err(e) => return self.fail(e),
            }
        }

        if let Err(e) = self.process_manual_requests() {
            return self.fail(e);
        }

        if self.source_ended {
            return self.drain_after_end();
        }

        match self.source.next_frame() {
            Ok(Some(frame)) => self.offer(frame),
            Ok(None) => {
                info!(source = %self.source.name(), "Frame source ended");
                self.source_ended = true;
                LoopAction::Continue
            }
            Err(e) => self.fail(e),
        }
    }

    fn offer(&mut self, frame: Frame) -> LoopAction {
        self.last_frame = Some(frame.clone());
        match self.session.offer_frame(frame, Instant::now()) {
            Ok(FrameDecision::Dispatch(request)) => match self.worker.dispatch(request) {
                Ok(()) => LoopAction::Continue,
                Err(e) => self.fail(e),
            },
            Ok(FrameDecision::Busy) | Ok(FrameDecision::Throttled) => LoopAction::Continue,
            Err(e) => self.fail(e),
        }
    }

    /// A finite source has ended: wait for the last reply, then stop
    fn drain_after_end(&mut self) -> LoopAction {
        if !self.session.is_in_flight() {
            return LoopAction::Stop;
        }
        match self.worker.wait_reply(self.reply_timeout) {
            Ok(Some(reply)) => match self.process_reply(reply) {
                Ok(()) => LoopAction::Continue,
                Err(e) => self.fail(e),
            },
            Ok(None) => {
                warn!("No reply for final detection request");
                LoopAction::Stop
            }
            Err(e) => self.fail(e),
        }
    }

    fn process_reply(&mut self, reply: DetectionReply) -> Result<(), CaptureError> {
        let Some(report) = self.session.handle_reply(reply, Instant::now())? else {
            return Ok(());
        };
        trace!(request_id = report.request_id, outcome = ?report.outcome, "Frame evaluated");
        let _ = self
            .events
            .unbounded_send(ScanEvent::Status(report.outcome.status_message()));
        if let Some(snapshot) = report.snapshot {
            self.submitter.submit(snapshot);
        }
        Ok(())
    }

    fn process_manual_requests(&mut self) -> Result<(), CaptureError> {
        while self.manual_rx.try_recv().is_ok() {
            let Some(frame) = self.last_frame.as_ref() else {
                debug!("Manual capture requested before the first frame");
                continue;
            };
            if let Some(snapshot) = self.session.manual_capture(frame, Instant::now())? {
                self.submitter.submit(snapshot);
            }
        }
        Ok(())
    }

    fn fail(&mut self, e: CaptureError) -> LoopAction {
        error!(session = %self.session.id(), error = %e, "Capture loop stopped");
        let _ = self.events.unbounded_send(ScanEvent::Fatal(e));
        LoopAction::Stop
    }

    fn finish(&mut self) {
        self.session.teardown();
        self.source.release();
        let _ = self.events.unbounded_send(ScanEvent::Stopped);
    }
}

/// Handle to a running capture loop
///
/// Dropping the handle stops the loop.
pub struct CaptureLoop {
    /// Thread handle for joining
    thread_handle: Option<JoinHandle<()>>,
    /// Signal to stop the loop
    stop_signal: Arc<AtomicBool>,
    /// Cleared on stop so pending submissions are discarded
    alive: Arc<AtomicBool>,
    manual: ManualTrigger,
    /// Name for logging
    name: String,
}

impl CaptureLoop {
    /// Whether the loop thread is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Handle for manual captures
    pub fn manual_trigger(&self) -> ManualTrigger {
        self.manual.clone()
    }

    /// Get a clone of the stop signal for external use
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_signal)
    }

    /// Signal the loop to stop (non-blocking)
    ///
    /// Results of submissions still in flight are discarded from now on.
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture loop stop");
        self.alive.store(false, Ordering::SeqCst);
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending the stop signal
    ///
    /// Useful when the source is finite and the loop ends by itself.
    /// Submissions already in flight still deliver their results.
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            debug!(name = %self.name, "Waiting for capture loop thread to finish");
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Capture loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Capture loop thread finished");
            }
        }
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "CaptureLoop dropped, stopping loop");
            self.stop();
        }
    }
}

/// Builder for capture loops
pub struct CaptureLoopBuilder {
    name: String,
    config: ScannerConfig,
    target: SubmitTarget,
}

impl CaptureLoopBuilder {
    /// Create a new builder with the given loop name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            config: ScannerConfig::default(),
            target: SubmitTarget::Recognize,
        }
    }

    pub fn config(mut self, config: ScannerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn submit_to(mut self, target: SubmitTarget) -> Self {
        self.target = target;
        self
    }

    /// Spawn the detection worker and the loop thread
    ///
    /// Submissions are spawned on `runtime`; events go to `events`. The
    /// event stream ends once the loop has stopped and every submission it
    /// started has finished.
    pub fn start(
        self,
        source: Box<dyn FrameSource>,
        loader: ModelLoader,
        client: RecognitionClient,
        runtime: Handle,
        events: EventSender,
    ) -> Result<CaptureLoop, CaptureError> {
        let worker = DetectionWorker::spawn(loader)?;
        let session = ScanSession::new(&self.config);
        let stop_signal = Arc::new(AtomicBool::new(false));
        let alive = Arc::new(AtomicBool::new(true));
        let (manual_tx, manual_rx) = mpsc::channel();

        let mut state = LoopState {
            session,
            source,
            worker,
            submitter: Submitter {
                client,
                target: self.target,
                runtime,
                events: events.clone(),
                alive: Arc::clone(&alive),
                remote_gap: self.config.remote_submit_cooldown(),
                last_remote_submit: None,
            },
            events,
            manual_rx,
            last_frame: None,
            source_ended: false,
            reply_timeout: self.config.reply_timeout(),
        };

        info!(name = %self.name, source = %state.source.name(), "Starting capture loop");

        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = self.name.clone();
        let thread_handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                debug!(name = %name_clone, "Capture loop thread started");

                loop {
                    if stop_signal_clone.load(Ordering::SeqCst) {
                        debug!(name = %name_clone, "Stop signal received");
                        break;
                    }
                    match state.step() {
                        LoopAction::Continue => {}
                        LoopAction::Stop => {
                            debug!(name = %name_clone, "Loop requested stop");
                            break;
                        }
                    }
                }

                state.finish();
                info!(name = %name_clone, "Capture loop thread exiting");
            })
            .map_err(|e| CaptureError::Source(format!("Failed to spawn capture thread: {}", e)))?;

        Ok(CaptureLoop {
            thread_handle: Some(thread_handle),
            stop_signal,
            alive,
            manual: ManualTrigger { tx: manual_tx },
            name: self.name,
        })
    }
}
