// SPDX-License-Identifier: GPL-3.0-only

//! Detection worker
//!
//! The keypoint model runs on its own thread and talks to the capture loop
//! only through channels. Each request carries its tile and the frame it was
//! cut from; the reply hands both the frame and the tile transform back, so
//! a reply can be processed without looking at any shared state.

use super::preprocess::PreprocessedTile;
use super::types::{DetectionResult, Keypoint};
use crate::backends::camera::Frame;
use crate::errors::CaptureError;
use image::RgbaImage;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Opaque corner detector: tile in, four corners out
pub trait KeypointModel: Send {
    /// Returns confidences and tile-normalized coordinates of the four corners
    fn infer(&mut self, tile: &RgbaImage) -> Result<[Keypoint; 4], String>;
}

/// Deferred model construction, run on the worker thread
pub type ModelLoader = Box<dyn FnOnce() -> Result<Box<dyn KeypointModel>, String> + Send>;

/// Replays recorded detector output in a loop
///
/// Useful for running the rest of the pipeline without a real model.
#[derive(Debug, Clone)]
pub struct ReplayModel {
    detections: Vec<[Keypoint; 4]>,
    position: usize,
}

impl ReplayModel {
    pub fn new(detections: Vec<[Keypoint; 4]>) -> Result<Self, String> {
        if detections.is_empty() {
            return Err("replay needs at least one detection".to_string());
        }
        Ok(Self {
            detections,
            position: 0,
        })
    }

    /// Load from a JSON array of four-keypoint arrays
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
        let detections: Vec<[Keypoint; 4]> = serde_json::from_str(&text)
            .map_err(|e| format!("Invalid detections in '{}': {}", path.display(), e))?;
        info!(path = %path.display(), count = detections.len(), "Loaded replay detections");
        Self::new(detections)
    }
}

impl KeypointModel for ReplayModel {
    fn infer(&mut self, _tile: &RgbaImage) -> Result<[Keypoint; 4], String> {
        let detection = self.detections[self.position];
        self.position = (self.position + 1) % self.detections.len();
        Ok(detection)
    }
}

/// One unit of work for the worker
#[derive(Debug)]
pub struct DetectionRequest {
    pub id: u64,
    pub tile: PreprocessedTile,
    /// Source frame, handed back in the reply
    pub frame: Frame,
}

/// Worker answer to a [`DetectionRequest`]
#[derive(Debug)]
pub struct DetectionReply {
    pub id: u64,
    pub frame: Frame,
    pub result: Result<DetectionResult, CaptureError>,
}

/// Handle to the detection thread
///
/// Dropping the handle closes the request channel and detaches the thread;
/// an inference that is still running finishes on its own and its reply is
/// discarded.
pub struct DetectionWorker {
    requests: Option<Sender<DetectionRequest>>,
    replies: Receiver<DetectionReply>,
    thread_handle: Option<JoinHandle<()>>,
}

impl DetectionWorker {
    /// Start the worker thread; the model is loaded on the first request
    pub fn spawn(loader: ModelLoader) -> Result<Self, CaptureError> {
        let (request_tx, request_rx) = mpsc::channel::<DetectionRequest>();
        let (reply_tx, reply_rx) = mpsc::channel::<DetectionReply>();

        let thread_handle = thread::Builder::new()
            .name("detection-worker".to_string())
            .spawn(move || run_worker(loader, request_rx, reply_tx))
            .map_err(|e| {
                CaptureError::ModelUnavailable(format!("Failed to spawn worker thread: {}", e))
            })?;

        Ok(Self {
            requests: Some(request_tx),
            replies: reply_rx,
            thread_handle: Some(thread_handle),
        })
    }

    /// Start a worker around an already constructed model
    pub fn with_model<M>(model: M) -> Result<Self, CaptureError>
    where
        M: KeypointModel + 'static,
    {
        Self::spawn(Box::new(move || -> Result<Box<dyn KeypointModel>, String> {
            Ok(Box::new(model))
        }))
    }

    /// Hand a request to the worker without waiting
    pub fn dispatch(&self, request: DetectionRequest) -> Result<(), CaptureError> {
        let Some(requests) = &self.requests else {
            return Err(CaptureError::WorkerGone);
        };
        trace!(id = request.id, "Dispatching detection request");
        requests.send(request).map_err(|_| CaptureError::WorkerGone)
    }

    /// Next reply if one is ready
    pub fn try_reply(&self) -> Result<Option<DetectionReply>, CaptureError> {
        match self.replies.try_recv() {
            Ok(reply) => Ok(Some(reply)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(CaptureError::WorkerGone),
        }
    }

    /// Wait up to `timeout` for the next reply
    pub fn wait_reply(&self, timeout: Duration) -> Result<Option<DetectionReply>, CaptureError> {
        match self.replies.recv_timeout(timeout) {
            Ok(reply) => Ok(Some(reply)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(CaptureError::WorkerGone),
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for DetectionWorker {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop after the current request
        self.requests.take();
        if self.thread_handle.take().is_some() {
            debug!("Detection worker detached");
        }
    }
}

fn run_worker(
    loader: ModelLoader,
    requests: Receiver<DetectionRequest>,
    replies: Sender<DetectionReply>,
) {
    debug!("Detection worker started");
    let mut loader = Some(loader);
    let mut model: Option<Box<dyn KeypointModel>> = None;

    for request in requests {
        if model.is_none() {
            let Some(load) = loader.take() else { break };
            let started = Instant::now();
            match load() {
                Ok(loaded) => {
                    info!(
                        elapsed_ms = started.elapsed().as_millis(),
                        "Keypoint model loaded"
                    );
                    model = Some(loaded);
                }
                Err(e) => {
                    error!(error = %e, "Failed to load keypoint model");
                    let _ = replies.send(DetectionReply {
                        id: request.id,
                        frame: request.frame,
                        result: Err(CaptureError::ModelUnavailable(e)),
                    });
                    break;
                }
            }
        }
        let Some(active) = model.as_mut() else { break };

        let started = Instant::now();
        let result = active
            .infer(&request.tile.image)
            .map(|keypoints| DetectionResult {
                keypoints,
                transform: request.tile.transform,
            })
            .map_err(CaptureError::Inference);
        if let Err(e) = &result {
            warn!(id = request.id, error = %e, "Inference failed");
        }
        trace!(
            id = request.id,
            elapsed_ms = started.elapsed().as_millis(),
            "Inference complete"
        );

        let reply = DetectionReply {
            id: request.id,
            frame: request.frame,
            result,
        };
        if replies.send(reply).is_err() {
            // Session is gone; nobody will read further replies
            break;
        }
    }

    debug!("Detection worker exiting");
}
