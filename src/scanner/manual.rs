// SPDX-License-Identifier: GPL-3.0-only

//! Manual capture: a fixed, centered region taken on user request

use super::types::CropRect;
use crate::backends::camera::Frame;
use crate::config::ScannerConfig;
use crate::errors::CaptureError;
use image::RgbaImage;
use std::time::{Duration, Instant};
use tracing::debug;

/// Crops a centered card-shaped region without running detection
///
/// Has its own short cooldown that only guards against repeated taps.
#[derive(Debug, Clone)]
pub struct ManualCapture {
    width_ratio: f64,
    height_ratio: f64,
    min_width: u32,
    min_height: u32,
    cooldown: Duration,
    last_capture: Option<Instant>,
}

impl ManualCapture {
    pub fn new(
        width_ratio: f64,
        height_ratio: f64,
        min_width: u32,
        min_height: u32,
        cooldown: Duration,
    ) -> Self {
        Self {
            width_ratio,
            height_ratio,
            min_width,
            min_height,
            cooldown,
            last_capture: None,
        }
    }

    pub fn from_config(config: &ScannerConfig) -> Self {
        Self::new(
            config.manual_width_ratio,
            config.manual_height_ratio,
            config.manual_min_width,
            config.manual_min_height,
            config.manual_cooldown(),
        )
    }

    /// Region for a frame of the given size
    ///
    /// The ratio-sized box is raised to the minimum pixel size, then capped
    /// at the frame size, then centered.
    pub fn region(&self, frame_width: u32, frame_height: u32) -> CropRect {
        let width = ((f64::from(frame_width) * self.width_ratio).round() as u32)
            .max(self.min_width)
            .min(frame_width);
        let height = ((f64::from(frame_height) * self.height_ratio).round() as u32)
            .max(self.min_height)
            .min(frame_height);
        CropRect {
            x: (frame_width - width) / 2,
            y: (frame_height - height) / 2,
            width,
            height,
        }
    }

    /// Crop the region out of `frame`
    ///
    /// Returns `Ok(None)` while the tap cooldown is active.
    pub fn capture(&mut self, frame: &Frame, now: Instant) -> Result<Option<RgbaImage>, CaptureError> {
        if frame.is_empty() {
            return Err(CaptureError::EmptyFrame {
                width: frame.width,
                height: frame.height,
            });
        }
        if let Some(last) = self.last_capture
            && now.saturating_duration_since(last) < self.cooldown
        {
            debug!("Manual capture ignored during cooldown");
            return Ok(None);
        }

        let rect = self.region(frame.width, frame.height);
        let Some(region) = rect.crop(&frame.image) else {
            return Ok(None);
        };
        self.last_capture = Some(now);
        debug!(
            x = rect.x,
            y = rect.y,
            width = rect.width,
            height = rect.height,
            "Manual capture"
        );
        Ok(Some(region))
    }
}
