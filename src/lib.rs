// SPDX-License-Identifier: GPL-3.0-only

//! Card Scanner - trading card recognition from a live video feed
//!
//! This library gates camera frames until a card is held steady, centered and
//! in focus, then submits a single capture to a recognition backend. A second
//! device can scan on behalf of the first through a remote session.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Frame sources and the recognition backend abstraction
//! - [`scanner`]: Frame gating, capture voting and the capture loop
//! - [`session`]: Remote sessions between two devices
//! - [`collection`]: Log of scanned cards
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let (events, mut rx) = event_channel();
//! let capture = CaptureLoopBuilder::new("scan")
//!     .config(config.scanner.clone())
//!     .start(source, loader, client, runtime.handle().clone(), events)?;
//! ```

pub mod backends;
pub mod collection;
pub mod config;
pub mod constants;
pub mod errors;
pub mod scanner;
pub mod session;

// Re-export commonly used types
pub use backends::camera::{Frame, FrameSource};
pub use backends::recognition::{HttpBackend, Recognition, RecognitionMatch, ScanBackend};
pub use collection::{ScanLog, ScannedCardRecord};
pub use config::Config;
pub use errors::{AppError, AppResult, CaptureError, RecognitionError, SessionError};
pub use scanner::{CaptureLoop, CaptureLoopBuilder, ScanEvent, ScanSession};
pub use session::RemoteSessionBridge;
