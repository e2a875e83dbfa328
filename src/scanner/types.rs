// SPDX-License-Identifier: GPL-3.0-only

//! Geometry and outcome types shared by the scanning pipeline

use super::preprocess::TileTransform;
use crate::constants::status;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// A point in source-frame pixel space (or tile-normalized space, by context)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One detector corner: confidence plus tile-normalized coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub confidence: f64,
    pub x: f64,
    pub y: f64,
}

impl Keypoint {
    pub const fn new(confidence: f64, x: f64, y: f64) -> Self {
        Self { confidence, x, y }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Raw detector output tagged with the transform of the tile it came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionResult {
    pub keypoints: [Keypoint; 4],
    pub transform: TileTransform,
}

impl DetectionResult {
    /// Lowest corner confidence; a non-finite confidence counts as the lowest
    pub fn min_confidence(&self) -> f64 {
        self.keypoints
            .iter()
            .map(|k| {
                if k.confidence.is_finite() {
                    k.confidence
                } else {
                    f64::NEG_INFINITY
                }
            })
            .fold(f64::INFINITY, f64::min)
    }

    /// Map the corners back into source-frame pixels
    pub fn to_quad(&self) -> Quad {
        Quad::new(self.keypoints.map(|k| self.transform.unmap(k.position())))
    }
}

/// Axis-aligned rectangle in whole pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    /// Copy this region out of `image`
    ///
    /// The rectangle is clamped to the image bounds first.
    pub fn crop(&self, image: &RgbaImage) -> Option<RgbaImage> {
        let x = self.x.min(image.width());
        let y = self.y.min(image.height());
        let width = self.width.min(image.width() - x);
        let height = self.height.min(image.height() - y);
        if width == 0 || height == 0 {
            return None;
        }
        Some(image::imageops::crop_imm(image, x, y, width, height).to_image())
    }
}

/// Four card corners in source-frame pixel space, in detector order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub corners: [Point; 4],
}

impl Quad {
    pub const fn new(corners: [Point; 4]) -> Self {
        Self { corners }
    }

    /// Polygon area (shoelace formula)
    pub fn area(&self) -> f64 {
        let mut twice = 0.0;
        for i in 0..4 {
            let a = self.corners[i];
            let b = self.corners[(i + 1) % 4];
            twice += a.x * b.y - b.x * a.y;
        }
        twice.abs() / 2.0
    }

    /// (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.corners.iter().fold(
            (
                f64::INFINITY,
                f64::INFINITY,
                f64::NEG_INFINITY,
                f64::NEG_INFINITY,
            ),
            |(min_x, min_y, max_x, max_y), p| {
                (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y))
            },
        )
    }

    /// Bounding box as whole pixels, `None` when degenerate
    pub fn bounding_rect(&self) -> Option<CropRect> {
        let (min_x, min_y, max_x, max_y) = self.bounds();
        let width = (max_x - min_x).trunc();
        let height = (max_y - min_y).trunc();
        if !(width >= 1.0 && height >= 1.0) {
            return None;
        }
        Some(CropRect {
            x: min_x.max(0.0).floor() as u32,
            y: min_y.max(0.0).floor() as u32,
            width: width as u32,
            height: height as u32,
        })
    }
}

/// Result of gating a single detector reply
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// Weakest corner fell below the confidence floor
    LowConfidence { min_confidence: f64 },
    /// Out of frame or too small
    InvalidGeometry,
    /// Reaches into the margin band
    OffCenter,
    /// Region too blurry
    LowFocus { score: f64 },
    /// Passed every gate
    Valid { quad: Quad, focus: f64 },
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid { .. })
    }

    pub fn quad(&self) -> Option<&Quad> {
        match self {
            ValidationOutcome::Valid { quad, .. } => Some(quad),
            _ => None,
        }
    }

    /// Human readable status line
    pub fn status_message(&self) -> String {
        match self {
            ValidationOutcome::LowConfidence { min_confidence } => {
                format!("Low keypoint confidence ({:.2})", min_confidence)
            }
            ValidationOutcome::InvalidGeometry => status::QUAD_AMBIGUOUS.to_string(),
            ValidationOutcome::OffCenter => status::NOT_CENTERED.to_string(),
            ValidationOutcome::LowFocus { score } => format!("Focus too low ({:.1})", score),
            ValidationOutcome::Valid { .. } => status::VALID_FRAME.to_string(),
        }
    }
}
