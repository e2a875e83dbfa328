// SPDX-License-Identifier: GPL-3.0-only

//! Recognition client: encodes captured regions and submits them

use crate::backends::recognition::{EncodedImage, Recognition, ScanBackend};
use crate::constants::api;
use crate::errors::{RecognitionError, SessionError};
use image::RgbaImage;
use image::codecs::jpeg::JpegEncoder;
use std::sync::Arc;
use tracing::{debug, info};

/// Encode a region as JPEG (alpha is dropped)
pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<EncodedImage, RecognitionError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(RecognitionError::Encoding("empty region".to_string()));
    }

    let rgb = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut bytes = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
        encoder.encode(rgb.as_raw(), width, height, image::ExtendedColorType::Rgb8)?;
    }

    Ok(EncodedImage {
        bytes,
        mime: "image/jpeg",
        file_name: api::IMAGE_FILE_NAME,
        width,
        height,
    })
}

/// Submits regions to the recognition backend
///
/// Each call is a single attempt. A failed submission is not retried; the
/// next confirmed capture is the retry.
#[derive(Clone)]
pub struct RecognitionClient {
    backend: Arc<dyn ScanBackend>,
    jpeg_quality: u8,
}

impl RecognitionClient {
    pub fn new(backend: Arc<dyn ScanBackend>) -> Self {
        Self {
            backend,
            jpeg_quality: api::JPEG_QUALITY,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn backend(&self) -> &Arc<dyn ScanBackend> {
        &self.backend
    }

    async fn encode(&self, region: Arc<RgbaImage>) -> Result<EncodedImage, RecognitionError> {
        let quality = self.jpeg_quality;
        // CPU-bound, keep it off the async workers
        tokio::task::spawn_blocking(move || encode_jpeg(&region, quality))
            .await
            .map_err(|e| RecognitionError::Encoding(format!("Encoding task error: {}", e)))?
    }

    /// Identify the card in `region`
    pub async fn submit(&self, region: Arc<RgbaImage>) -> Result<Recognition, RecognitionError> {
        let encoded = self.encode(region).await?;
        debug!(
            width = encoded.width,
            height = encoded.height,
            size = encoded.bytes.len(),
            "Submitting region"
        );

        let recognition = self.backend.recognize(encoded).await?;
        match &recognition {
            Recognition::Match(card) => info!(card_id = %card.card_id, name = %card.name, "Card recognized"),
            Recognition::NoMatch => info!("No matching card"),
        }
        Ok(recognition)
    }

    /// Upload `region` into a remote session from the second device
    pub async fn submit_to_session(
        &self,
        session_id: &str,
        region: Arc<RgbaImage>,
    ) -> Result<(), SessionError> {
        let encoded = self.encode(region).await?;
        self.backend.submit_to_session(session_id, encoded).await
    }
}
