// SPDX-License-Identifier: GPL-3.0-only

//! Confidence and geometry gates for detected card corners

use super::types::{DetectionResult, Quad, ValidationOutcome};
use crate::config::ScannerConfig;
use tracing::trace;

/// Decides whether a detection is a usable, centered card outline
///
/// Checks run in a fixed order and the first failure wins:
/// confidence floor, then bounds and area, then centering.
#[derive(Debug, Clone, Copy)]
pub struct GeometryValidator {
    confidence_threshold: f64,
    center_margin_ratio: f64,
    min_area_ratio: f64,
}

impl GeometryValidator {
    pub fn new(confidence_threshold: f64, center_margin_ratio: f64, min_area_ratio: f64) -> Self {
        Self {
            confidence_threshold,
            center_margin_ratio,
            min_area_ratio,
        }
    }

    pub fn from_config(config: &ScannerConfig) -> Self {
        Self::new(
            config.confidence_threshold,
            config.center_margin_ratio,
            config.min_area_ratio,
        )
    }

    /// All corners inside the frame and the polygon covers enough of it
    pub fn is_in_bounds(&self, quad: &Quad, width: u32, height: u32) -> bool {
        let (w, h) = (f64::from(width), f64::from(height));
        let inside = quad
            .corners
            .iter()
            .all(|p| p.x >= 0.0 && p.y >= 0.0 && p.x <= w && p.y <= h);
        inside && quad.area() >= w * h * self.min_area_ratio
    }

    /// Bounding box stays clear of the margin band on every edge
    pub fn is_centered(&self, quad: &Quad, width: u32, height: u32) -> bool {
        let (w, h) = (f64::from(width), f64::from(height));
        let margin_x = w * self.center_margin_ratio;
        let margin_y = h * self.center_margin_ratio;
        let (min_x, min_y, max_x, max_y) = quad.bounds();
        min_x >= margin_x && max_x <= w - margin_x && min_y >= margin_y && max_y <= h - margin_y
    }

    /// Run the gates in order
    ///
    /// Returns the un-mapped quad when every gate passes, or the outcome of
    /// the first failing gate.
    pub fn check(
        &self,
        detection: &DetectionResult,
        width: u32,
        height: u32,
    ) -> Result<Quad, ValidationOutcome> {
        let min_confidence = detection.min_confidence();
        if min_confidence < self.confidence_threshold {
            trace!(min_confidence, "Rejected: low confidence");
            return Err(ValidationOutcome::LowConfidence { min_confidence });
        }

        let quad = detection.to_quad();
        if !self.is_in_bounds(&quad, width, height) {
            trace!(area = quad.area(), "Rejected: invalid geometry");
            return Err(ValidationOutcome::InvalidGeometry);
        }
        if !self.is_centered(&quad, width, height) {
            trace!("Rejected: off center");
            return Err(ValidationOutcome::OffCenter);
        }
        Ok(quad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::preprocess::TileTransform;
    use crate::scanner::types::{Keypoint, Point};

    const W: u32 = 640;
    const H: u32 = 480;

    fn validator() -> GeometryValidator {
        GeometryValidator::from_config(&ScannerConfig::default())
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Quad {
        Quad::new([
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
    }

    /// Detection whose corners un-map exactly onto the given frame points
    fn detection_for(quad: &Quad, confidences: [f64; 4]) -> DetectionResult {
        let transform = TileTransform::for_frame(W, H, 224).unwrap();
        let mut keypoints = [Keypoint::new(0.0, 0.0, 0.0); 4];
        for (i, corner) in quad.corners.iter().enumerate() {
            let p = transform.map(*corner);
            keypoints[i] = Keypoint::new(confidences[i], p.x, p.y);
        }
        DetectionResult {
            keypoints,
            transform,
        }
    }

    #[test]
    fn test_centered_card_passes() {
        let quad = rect(200.0, 80.0, 440.0, 400.0);
        let detection = detection_for(&quad, [0.95; 4]);
        let checked = validator().check(&detection, W, H).unwrap();
        for (a, b) in checked.corners.iter().zip(quad.corners.iter()) {
            assert!((a.x - b.x).abs() < 1e-6 && (a.y - b.y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_low_confidence_takes_precedence() {
        // Off-frame geometry, but confidence is checked first
        let quad = rect(-50.0, -50.0, 700.0, 500.0);
        let detection = detection_for(&quad, [0.5, 0.9, 0.9, 0.9]);
        assert_eq!(
            validator().check(&detection, W, H),
            Err(ValidationOutcome::LowConfidence {
                min_confidence: 0.5
            })
        );
    }

    #[test]
    fn test_non_finite_confidence_is_low_confidence() {
        let quad = rect(200.0, 80.0, 440.0, 400.0);
        for confidences in [
            [f64::NAN; 4],
            [0.95, f64::NAN, 0.95, 0.95],
            [0.95, 0.95, f64::INFINITY, 0.95],
        ] {
            let detection = detection_for(&quad, confidences);
            match validator().check(&detection, W, H) {
                Err(ValidationOutcome::LowConfidence { min_confidence }) => {
                    assert_eq!(min_confidence, f64::NEG_INFINITY)
                }
                other => panic!("{:?} gave {:?}", confidences, other),
            }
        }
    }

    #[test]
    fn test_out_of_frame_is_invalid_geometry() {
        let quad = rect(-10.0, 50.0, 300.0, 400.0);
        let detection = detection_for(&quad, [0.95; 4]);
        assert_eq!(
            validator().check(&detection, W, H),
            Err(ValidationOutcome::InvalidGeometry)
        );
    }

    #[test]
    fn test_tiny_quad_is_invalid_geometry() {
        // 40x40 = 1600 px, far below 5% of 307200
        let quad = rect(300.0, 220.0, 340.0, 260.0);
        let detection = detection_for(&quad, [0.95; 4]);
        assert_eq!(
            validator().check(&detection, W, H),
            Err(ValidationOutcome::InvalidGeometry)
        );
    }

    #[test]
    fn test_quads_in_margin_band_are_off_center() {
        // Each quad is in frame and large enough, but touches one margin band
        let cases = [
            rect(5.0, 80.0, 300.0, 400.0),
            rect(300.0, 80.0, 635.0, 400.0),
            rect(200.0, 2.0, 440.0, 300.0),
            rect(200.0, 200.0, 440.0, 478.0),
            rect(1.0, 1.0, 639.0, 479.0),
        ];
        for quad in cases {
            let detection = detection_for(&quad, [0.95; 4]);
            assert_eq!(
                validator().check(&detection, W, H),
                Err(ValidationOutcome::OffCenter),
                "quad {:?}",
                quad
            );
        }
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let quad = rect(0.0, 0.0, 640.0, 480.0);
        assert!(validator().is_in_bounds(&quad, W, H));
        assert!(!validator().is_centered(&quad, W, H));
    }
}
