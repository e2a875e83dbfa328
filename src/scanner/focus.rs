// SPDX-License-Identifier: GPL-3.0-only

//! Sharpness scoring
//!
//! The score is the population variance of a 4-neighbour Laplacian over an
//! integer BT.601 grayscale image. Border pixels have no full neighbourhood;
//! they keep a zero response but still count towards the mean and variance.
//! Thresholds are calibrated against exactly this definition.

use super::types::{Quad, ValidationOutcome};
use crate::config::ScannerConfig;
use image::RgbaImage;
use tracing::trace;

/// Scores region sharpness and applies the focus threshold
#[derive(Debug, Clone, Copy)]
pub struct FocusScorer {
    threshold: f64,
}

impl FocusScorer {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn from_config(config: &ScannerConfig) -> Self {
        Self::new(config.focus_threshold)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Variance of the Laplacian over the whole image
    pub fn score(&self, region: &RgbaImage) -> f64 {
        laplacian_variance(region)
    }

    /// Crop the quad's bounding box out of `frame` and gate on its sharpness
    ///
    /// A quad whose bounding box has no pixel area is reported as invalid
    /// geometry.
    pub fn evaluate(&self, frame: &RgbaImage, quad: &Quad) -> ValidationOutcome {
        let Some(region) = extract_region(frame, quad) else {
            return ValidationOutcome::InvalidGeometry;
        };

        let score = self.score(&region);
        trace!(
            score,
            width = region.width(),
            height = region.height(),
            "Focus score"
        );

        if score < self.threshold {
            ValidationOutcome::LowFocus { score }
        } else {
            ValidationOutcome::Valid {
                quad: *quad,
                focus: score,
            }
        }
    }
}

/// Axis-aligned bounding region of `quad`, copied out of `frame`
pub fn extract_region(frame: &RgbaImage, quad: &Quad) -> Option<RgbaImage> {
    quad.bounding_rect()?.crop(frame)
}

/// BT.601 luma, truncated to an integer
fn luma(pixel: &image::Rgba<u8>) -> i32 {
    let [r, g, b, _] = pixel.0;
    (0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)) as i32
}

/// Population variance of the Laplacian response
pub fn laplacian_variance(image: &RgbaImage) -> f64 {
    let (width, height) = (image.width() as usize, image.height() as usize);
    let count = width * height;
    if count == 0 {
        return 0.0;
    }

    let gray: Vec<i32> = image.pixels().map(luma).collect();
    let mut response = vec![0.0f64; count];

    for y in 1..height.saturating_sub(1) {
        for x in 1..width.saturating_sub(1) {
            let i = y * width + x;
            let sum = gray[i - width] + gray[i + width] + gray[i - 1] + gray[i + 1] - 4 * gray[i];
            response[i] = f64::from(sum);
        }
    }

    let n = count as f64;
    let mean = response.iter().sum::<f64>() / n;
    response.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::types::Point;
    use image::Rgba;

    fn checkerboard(width: u32, height: u32, cell: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            if ((x / cell) + (y / cell)) % 2 == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        })
    }

    #[test]
    fn test_flat_image_scores_zero() {
        let flat = RgbaImage::from_pixel(50, 40, Rgba([120, 80, 30, 255]));
        assert_eq!(laplacian_variance(&flat), 0.0);
    }

    #[test]
    fn test_single_bright_pixel() {
        // 3x3 image: only the centre has a response, -4 * luma
        let white = Rgba([255, 255, 255, 255]);
        let mut image = RgbaImage::from_pixel(3, 3, Rgba([0, 0, 0, 255]));
        image.put_pixel(1, 1, white);
        let center = -4.0 * f64::from(luma(&white));
        let mean = center / 9.0;
        let expected = ((center - mean).powi(2) + 8.0 * mean * mean) / 9.0;
        assert!((laplacian_variance(&image) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_checkerboard_is_sharp() {
        let scorer = FocusScorer::new(98.0);
        let sharp = checkerboard(64, 64, 4);
        assert!(scorer.score(&sharp) > 98.0);
    }

    #[test]
    fn test_tiny_images_have_no_interior() {
        assert_eq!(laplacian_variance(&checkerboard(2, 2, 1)), 0.0);
        assert_eq!(laplacian_variance(&RgbaImage::new(0, 0)), 0.0);
    }

    #[test]
    fn test_evaluate_blurry_region() {
        let frame = RgbaImage::from_pixel(200, 200, Rgba([90, 90, 90, 255]));
        let quad = Quad::new([
            Point::new(20.0, 20.0),
            Point::new(180.0, 20.0),
            Point::new(180.0, 180.0),
            Point::new(20.0, 180.0),
        ]);
        let outcome = FocusScorer::new(98.0).evaluate(&frame, &quad);
        assert_eq!(outcome, ValidationOutcome::LowFocus { score: 0.0 });
    }

    #[test]
    fn test_evaluate_sharp_region() {
        let frame = checkerboard(200, 200, 3);
        let quad = Quad::new([
            Point::new(20.0, 20.0),
            Point::new(180.0, 20.0),
            Point::new(180.0, 180.0),
            Point::new(20.0, 180.0),
        ]);
        let outcome = FocusScorer::new(98.0).evaluate(&frame, &quad);
        assert!(outcome.is_valid(), "{:?}", outcome);
    }
}
