// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the card scanner
//!
//! Detection gating (low confidence, bad geometry, blur) and "no match" are
//! ordinary outcomes and never show up here. These enums only cover the
//! conditions that callers have to react to.

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Frame source or detection worker failure
    Capture(CaptureError),
    /// Recognition backend failure
    Recognition(RecognitionError),
    /// Remote session failure
    Session(SessionError),
    /// Configuration errors
    Config(String),
    /// Filesystem errors
    Io(String),
}

/// Errors that end a scanning session
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// Frame with a zero dimension reached the pipeline
    EmptyFrame { width: u32, height: u32 },
    /// No camera or frame source available
    NoCamera,
    /// Frame source failed while streaming
    Source(String),
    /// The keypoint model could not be loaded
    ModelUnavailable(String),
    /// A single inference call failed (the session keeps running)
    Inference(String),
    /// Detection worker thread is gone
    WorkerGone,
}

/// Transient recognition backend failures
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionError {
    /// Request never got an HTTP response
    Network(String),
    /// Backend answered with a non-success status
    Backend { status: u16, message: String },
    /// Response body could not be understood
    InvalidResponse(String),
    /// Region image could not be encoded for upload
    Encoding(String),
}

/// Remote session failures
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Backend reports the session as expired (HTTP 403)
    Expired { session_id: String },
    /// Backend does not know the session (HTTP 404)
    NotFound { session_id: String },
    /// Any other transport or backend failure
    Transport(RecognitionError),
}

impl CaptureError {
    /// Whether the session has to stop after this error
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CaptureError::Inference(_))
    }
}

impl SessionError {
    /// Expired and unknown sessions are remedied by minting a new one
    pub fn needs_new_session(&self) -> bool {
        matches!(
            self,
            SessionError::Expired { .. } | SessionError::NotFound { .. }
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Capture(e) => write!(f, "Capture error: {}", e),
            AppError::Recognition(e) => write!(f, "Recognition error: {}", e),
            AppError::Session(e) => write!(f, "Session error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::EmptyFrame { width, height } => {
                write!(f, "Frame has zero size ({}x{})", width, height)
            }
            CaptureError::NoCamera => write!(f, "No camera available"),
            CaptureError::Source(msg) => write!(f, "Frame source failed: {}", msg),
            CaptureError::ModelUnavailable(msg) => {
                write!(f, "Detection model unavailable: {}", msg)
            }
            CaptureError::Inference(msg) => write!(f, "Inference failed: {}", msg),
            CaptureError::WorkerGone => write!(f, "Detection worker stopped"),
        }
    }
}

impl fmt::Display for RecognitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecognitionError::Network(msg) => write!(f, "Network error: {}", msg),
            RecognitionError::Backend { status, message } => {
                write!(f, "Backend returned {}: {}", status, message)
            }
            RecognitionError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            RecognitionError::Encoding(msg) => write!(f, "Image encoding failed: {}", msg),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Expired { session_id } => write!(f, "Session {} expired", session_id),
            SessionError::NotFound { session_id } => write!(f, "Session {} not found", session_id),
            SessionError::Transport(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for RecognitionError {}
impl std::error::Error for SessionError {}

impl From<CaptureError> for AppError {
    fn from(err: CaptureError) -> Self {
        AppError::Capture(err)
    }
}

impl From<RecognitionError> for AppError {
    fn from(err: RecognitionError) -> Self {
        AppError::Recognition(err)
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        AppError::Session(err)
    }
}

impl From<RecognitionError> for SessionError {
    fn from(err: RecognitionError) -> Self {
        SessionError::Transport(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for RecognitionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RecognitionError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            RecognitionError::Backend {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            RecognitionError::Network(err.to_string())
        }
    }
}

impl From<image::ImageError> for RecognitionError {
    fn from(err: image::ImageError) -> Self {
        RecognitionError::Encoding(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_errors_are_not_fatal() {
        assert!(!CaptureError::Inference("nan".into()).is_fatal());
        assert!(CaptureError::WorkerGone.is_fatal());
        assert!(
            CaptureError::EmptyFrame {
                width: 0,
                height: 480
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_session_remediation() {
        let expired = SessionError::Expired {
            session_id: "a".into(),
        };
        let missing = SessionError::NotFound {
            session_id: "a".into(),
        };
        let transport = SessionError::from(RecognitionError::Network("down".into()));
        assert!(expired.needs_new_session());
        assert!(missing.needs_new_session());
        assert!(!transport.needs_new_session());
    }

    #[test]
    fn test_display_includes_context() {
        let err = AppError::from(RecognitionError::Backend {
            status: 500,
            message: "boom".into(),
        });
        assert_eq!(
            err.to_string(),
            "Recognition error: Backend returned 500: boom"
        );
    }
}
