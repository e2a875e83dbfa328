// SPDX-License-Identifier: GPL-3.0-only

//! Join codes for the second device
//!
//! The primary device shows its session as a QR code holding the join URL.
//! The second device recovers the session id either from a camera frame
//! showing that code or from the URL text itself.

use crate::constants::remote;
use image::RgbaImage;
use tracing::{debug, trace};
use uuid::Uuid;

/// Extract a session id from a join URL or a bare session uuid
pub fn parse_join_target(text: &str) -> Option<String> {
    let text = text.trim();
    if let Ok(id) = Uuid::parse_str(text) {
        return Some(id.to_string());
    }

    let marker = format!("/{}/", remote::JOIN_PATH);
    let (_, rest) = text.split_once(marker.as_str())?;
    let id = rest
        .split(['/', '?', '#'])
        .next()
        .filter(|id| !id.is_empty())?;

    id.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        .then(|| id.to_string())
}

/// Decode a join code from a camera frame
///
/// Returns the session id of the first QR code that holds a join target.
pub fn decode_join_code(frame: &RgbaImage) -> Option<String> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
            let p = frame.get_pixel(x as u32, y as u32);
            ((p[0] as u32 * 299 + p[1] as u32 * 587 + p[2] as u32 * 114) / 1000) as u8
        });

    let grids = prepared.detect_grids();
    trace!(count = grids.len(), "QR grids detected");

    grids.iter().find_map(|grid| match grid.decode() {
        Ok((_, content)) => {
            let target = parse_join_target(&content);
            if target.is_none() {
                debug!(content = %content, "QR code is not a join code");
            }
            target
        }
        Err(e) => {
            debug!(error = %e, "Failed to decode QR code");
            None
        }
    })
}
