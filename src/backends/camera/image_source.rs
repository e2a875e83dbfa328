// SPDX-License-Identifier: GPL-3.0-only

//! Still image replay source
//!
//! Plays a directory of images back as a paced frame stream. Used for
//! offline runs of the full pipeline and for tests.

use super::FrameSource;
use super::types::Frame;
use crate::constants;
use crate::errors::CaptureError;
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// File extensions picked up by [`ImageSequenceSource::from_dir`]
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

/// Load an image file and convert it to a Frame
pub fn load_image_as_frame(path: &Path) -> Result<Frame, CaptureError> {
    debug!(path = %path.display(), "Loading image file");

    let img = image::open(path).map_err(|e| {
        CaptureError::Source(format!("Failed to load image '{}': {}", path.display(), e))
    })?;

    let frame = Frame::new(img.to_rgba8());
    debug!(width = frame.width, height = frame.height, "Image loaded");
    Ok(frame)
}

/// Replays still images at a fixed frame rate
pub struct ImageSequenceSource {
    name: String,
    paths: Vec<PathBuf>,
    /// Decoded images, filled on first use
    cache: Vec<Option<Arc<RgbaImage>>>,
    position: usize,
    /// Number of frames emitted per image before moving on
    repeat: usize,
    emitted_for_current: usize,
    frame_interval: Duration,
    last_emit: Option<Instant>,
    looping: bool,
}

impl ImageSequenceSource {
    /// Collect the images in `dir`, sorted by file name
    pub fn from_dir(dir: &Path, fps: u32) -> Result<Self, CaptureError> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            CaptureError::Source(format!("Cannot read '{}': {}", dir.display(), e))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(CaptureError::NoCamera);
        }

        info!(dir = %dir.display(), count = paths.len(), fps, "Opened image sequence");
        Ok(Self::from_paths(paths, fps))
    }

    /// Replay an explicit list of files
    pub fn from_paths(paths: Vec<PathBuf>, fps: u32) -> Self {
        let cache = vec![None; paths.len()];
        Self {
            name: "image-sequence".to_string(),
            paths,
            cache,
            position: 0,
            repeat: 1,
            emitted_for_current: 0,
            frame_interval: constants::frame_interval(fps),
            last_emit: None,
            looping: false,
        }
    }

    /// Replay in-memory images (no disk access)
    pub fn from_images(images: Vec<RgbaImage>, fps: u32) -> Self {
        let paths = (0..images.len())
            .map(|i| PathBuf::from(format!("memory-{}", i)))
            .collect();
        let mut source = Self::from_paths(paths, fps);
        source.cache = images.into_iter().map(|img| Some(Arc::new(img))).collect();
        source.name = "memory-sequence".to_string();
        source
    }

    /// Emit every image `count` times in a row
    pub fn repeat_each(mut self, count: usize) -> Self {
        self.repeat = count.max(1);
        self
    }

    /// Start over after the last image instead of ending the stream
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    fn image_at(&mut self, index: usize) -> Result<Arc<RgbaImage>, CaptureError> {
        if let Some(image) = &self.cache[index] {
            return Ok(Arc::clone(image));
        }
        let frame = load_image_as_frame(&self.paths[index])?;
        self.cache[index] = Some(Arc::clone(&frame.image));
        Ok(frame.image)
    }

    fn pace(&mut self) {
        if let Some(last) = self.last_emit {
            let elapsed = last.elapsed();
            if elapsed < self.frame_interval {
                std::thread::sleep(self.frame_interval - elapsed);
            }
        }
        self.last_emit = Some(Instant::now());
    }
}

impl FrameSource for ImageSequenceSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if self.position >= self.paths.len() {
            if !self.looping || self.paths.is_empty() {
                return Ok(None);
            }
            self.position = 0;
        }

        let image = self.image_at(self.position)?;
        self.emitted_for_current += 1;
        if self.emitted_for_current >= self.repeat {
            self.emitted_for_current = 0;
            self.position += 1;
        }

        self.pace();
        Ok(Some(Frame::from_shared(image, Instant::now())))
    }

    fn release(&mut self) {
        debug!(name = %self.name, "Releasing image sequence");
        self.cache.iter_mut().for_each(|slot| *slot = None);
    }
}
