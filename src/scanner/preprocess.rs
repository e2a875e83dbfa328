// SPDX-License-Identifier: GPL-3.0-only

//! Frame to detector tile preprocessing
//!
//! A frame is scaled so its shorter side matches the tile size, then
//! center-cropped to a square. The transform is kept next to the tile so
//! detector output can be mapped back to frame pixels.

use super::types::Point;
use crate::backends::camera::Frame;
use crate::errors::CaptureError;
use image::RgbaImage;
use image::imageops::{self, FilterType};
use tracing::trace;

/// Scale and crop applied to produce a tile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileTransform {
    /// Uniform scale from frame pixels to scaled pixels
    pub scale: f64,
    /// Horizontal crop offset in scaled pixels
    pub crop_x: u32,
    /// Vertical crop offset in scaled pixels
    pub crop_y: u32,
    /// Tile side length
    pub tile_size: u32,
}

impl TileTransform {
    /// Compute the transform for a frame of the given size
    pub fn for_frame(width: u32, height: u32, tile_size: u32) -> Result<Self, CaptureError> {
        if width == 0 || height == 0 || tile_size == 0 {
            return Err(CaptureError::EmptyFrame { width, height });
        }

        let target = f64::from(tile_size);
        let scale = (target / f64::from(width)).max(target / f64::from(height));
        let (scaled_width, scaled_height) = Self::scaled_dimensions(width, height, scale, tile_size);

        Ok(Self {
            scale,
            crop_x: (scaled_width - tile_size) / 2,
            crop_y: (scaled_height - tile_size) / 2,
            tile_size,
        })
    }

    // Never below the tile size, even when floating point lands just under it
    fn scaled_dimensions(width: u32, height: u32, scale: f64, tile_size: u32) -> (u32, u32) {
        let w = ((f64::from(width) * scale).floor() as u32).max(tile_size);
        let h = ((f64::from(height) * scale).floor() as u32).max(tile_size);
        (w, h)
    }

    /// Tile-normalized point to frame pixels
    pub fn unmap(&self, p: Point) -> Point {
        let t = f64::from(self.tile_size);
        Point::new(
            (p.x * t + f64::from(self.crop_x)) / self.scale,
            (p.y * t + f64::from(self.crop_y)) / self.scale,
        )
    }

    /// Frame pixels to tile-normalized point
    pub fn map(&self, p: Point) -> Point {
        let t = f64::from(self.tile_size);
        Point::new(
            (p.x * self.scale - f64::from(self.crop_x)) / t,
            (p.y * self.scale - f64::from(self.crop_y)) / t,
        )
    }
}

/// Square detector input and the transform that produced it
#[derive(Debug, Clone)]
pub struct PreprocessedTile {
    pub image: RgbaImage,
    pub transform: TileTransform,
}

/// Produces detector tiles from frames
#[derive(Debug, Clone, Copy)]
pub struct FramePreprocessor {
    tile_size: u32,
}

impl FramePreprocessor {
    pub fn new(tile_size: u32) -> Self {
        Self { tile_size }
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Scale and center-crop a frame into a tile
    ///
    /// A frame with a zero dimension is a precondition violation and is
    /// reported as [`CaptureError::EmptyFrame`].
    pub fn preprocess(&self, frame: &Frame) -> Result<PreprocessedTile, CaptureError> {
        let transform = TileTransform::for_frame(frame.width, frame.height, self.tile_size)?;
        let (scaled_width, scaled_height) = TileTransform::scaled_dimensions(
            frame.width,
            frame.height,
            transform.scale,
            self.tile_size,
        );

        let scaled = imageops::resize(
            frame.image.as_ref(),
            scaled_width,
            scaled_height,
            FilterType::Triangle,
        );
        let image = imageops::crop_imm(
            &scaled,
            transform.crop_x,
            transform.crop_y,
            self.tile_size,
            self.tile_size,
        )
        .to_image();

        trace!(
            scaled_width,
            scaled_height,
            crop_x = transform.crop_x,
            crop_y = transform.crop_y,
            "Prepared detector tile"
        );

        Ok(PreprocessedTile { image, transform })
    }
}
