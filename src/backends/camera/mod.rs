// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! A [`FrameSource`] is the single owner of one physical (or virtual) video
//! source. Exactly one capture loop pulls from it at a time.

pub mod image_source;
pub mod types;

pub use image_source::{ImageSequenceSource, load_image_as_frame};
pub use types::*;

use crate::errors::CaptureError;

/// Something that produces frames for a capture loop
///
/// `next_frame` may block until the next frame is due. `Ok(None)` marks the
/// end of a finite stream.
pub trait FrameSource: Send {
    /// Short name for logging
    fn name(&self) -> &str;

    /// Pull the next frame
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;

    /// Release the underlying device
    ///
    /// Called once when the owning capture loop exits.
    fn release(&mut self) {}
}
