// SPDX-License-Identifier: GPL-3.0-only
// Shared types for frame sources

//! Shared types for camera backends

use image::RgbaImage;
use std::sync::Arc;
use std::time::Instant;

/// A captured video frame
///
/// The pixel buffer is reference counted, so handing a frame to the
/// detection worker and back moves a pointer, never the pixels. Frames are
/// never mutated after creation.
#[derive(Debug, Clone)]
pub struct Frame {
    /// RGBA pixels
    pub image: Arc<RgbaImage>,
    pub width: u32,
    pub height: u32,
    /// Monotonic capture time
    pub captured_at: Instant,
}

impl Frame {
    /// Wrap a decoded image, stamping it with the current time
    pub fn new(image: RgbaImage) -> Self {
        Self::from_shared(Arc::new(image), Instant::now())
    }

    /// Build a frame around an already shared buffer
    pub fn from_shared(image: Arc<RgbaImage>, captured_at: Instant) -> Self {
        let (width, height) = image.dimensions();
        Self {
            image,
            width,
            height,
            captured_at,
        }
    }

    /// Whether either dimension is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}
