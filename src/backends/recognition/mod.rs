// SPDX-License-Identifier: GPL-3.0-only

//! Recognition backend abstraction
//!
//! The scanner only ever talks to the backend through [`ScanBackend`], which
//! keeps the HTTP client swappable for tests and offline runs.

pub mod http;
pub mod types;

pub use http::HttpBackend;
pub use types::*;

use crate::errors::{RecognitionError, SessionError};
use futures::future::BoxFuture;

/// Card recognition and remote session endpoints
pub trait ScanBackend: Send + Sync {
    /// Identify the card in an encoded region image
    ///
    /// A response without a predicted identity is `Ok(Recognition::NoMatch)`.
    fn recognize(&self, image: EncodedImage) -> BoxFuture<'_, Result<Recognition, RecognitionError>>;

    /// Create a remote session and return its id
    fn create_session(&self) -> BoxFuture<'_, Result<String, RecognitionError>>;

    /// Poll a remote session for a completed result
    fn poll_session<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, Result<SessionPoll, SessionError>>;

    /// Upload a capture from the second device into a remote session
    fn submit_to_session<'a>(
        &'a self,
        session_id: &'a str,
        image: EncodedImage,
    ) -> BoxFuture<'a, Result<(), SessionError>>;
}
