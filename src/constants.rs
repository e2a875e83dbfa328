// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants
//!
//! These are the built-in defaults. Every tunable here is also exposed
//! through [`crate::config::ScannerConfig`] or [`crate::config::SessionConfig`].

use std::time::Duration;

/// Application name, also used for the config directory
pub const APP_NAME: &str = "card-scanner";

/// Version string embedded by the build script
pub const APP_VERSION: &str = env!("GIT_VERSION");

/// Keypoint detection and frame gating
pub mod detection {
    /// Side length of the square detector input tile
    pub const TILE_SIZE: u32 = 224;

    /// Minimum per-corner confidence
    pub const CONFIDENCE_THRESHOLD: f64 = 0.83;

    /// Margin ratio per side used by the centering check
    pub const CENTER_MARGIN_RATIO: f64 = 0.05;

    /// Minimum quad area as a fraction of the frame area
    pub const MIN_AREA_RATIO: f64 = 0.05;

    /// Minimum Laplacian variance for a sharp region
    pub const FOCUS_THRESHOLD: f64 = 98.0;

    /// Time after which an unanswered detection request is abandoned
    pub const REPLY_TIMEOUT_MS: u64 = 5_000;
}

/// Temporal quorum voting
pub mod voting {
    /// Number of recent outcomes kept in the window
    pub const WINDOW_SIZE: usize = 10;

    /// Valid outcomes in the window needed to trigger
    pub const REQUIRED_VALID: usize = 5;

    /// Quiet period after a trigger
    pub const COOLDOWN_MS: u64 = 2_000;
}

/// Frame sampling cadence
pub mod sampling {
    /// Upper bound on sampled frames per second
    pub const TARGET_FPS: u32 = 30;

    /// Process one of every N sampled frames
    pub const SKIP_FACTOR: u32 = 4;
}

/// Manual (tap to capture) region
pub mod manual_capture {
    /// Region width as a fraction of the frame width
    pub const WIDTH_RATIO: f64 = 0.42;

    /// Region height as a fraction of the frame height
    pub const HEIGHT_RATIO: f64 = 0.84;

    /// Minimum region width in pixels
    pub const MIN_WIDTH: u32 = 280;

    /// Minimum region height in pixels
    pub const MIN_HEIGHT: u32 = 360;

    /// Cooldown expressed in sampling intervals
    pub const COOLDOWN_FRAMES: u32 = 15;
}

/// Remote (second device) sessions
pub mod remote {
    /// Minimum gap between two submissions from the second device
    pub const SUBMIT_COOLDOWN_MS: u64 = 3_000;

    /// Poll interval on the primary device
    pub const POLL_INTERVAL_MS: u64 = 2_500;

    /// Backend session lifetime
    pub const SESSION_TTL_MINUTES: i64 = 55;

    /// Path segment of the join URL
    pub const JOIN_PATH: &str = "mobile-scan";

    /// Default base of the join URL
    pub const DEFAULT_JOIN_URL_BASE: &str = "http://localhost:5173";
}

/// Recognition backend HTTP API
pub mod api {
    /// Default backend base URL
    pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

    /// Recognition endpoint
    pub const INFER_PATH: &str = "/infer";

    /// Remote session creation endpoint
    pub const SESSION_CREATE_PATH: &str = "/api/mobile-infer/create";

    /// Remote session result endpoint (followed by the session id)
    pub const SESSION_RESULT_PATH: &str = "/api/mobile-infer/result";

    /// Remote session submit endpoint (followed by the session id)
    pub const SESSION_SUBMIT_PATH: &str = "/api/mobile-infer/submit";

    /// Multipart field carrying the region image
    pub const IMAGE_FIELD: &str = "roi_image";

    /// File name sent with the region image
    pub const IMAGE_FILE_NAME: &str = "roi.jpg";

    /// JPEG quality for uploads
    pub const JPEG_QUALITY: u8 = 90;

    /// Whole-request timeout
    pub const REQUEST_TIMEOUT_SECS: u64 = 20;
}

/// Status lines shown to the user
pub mod status {
    pub const QUAD_AMBIGUOUS: &str = "Quadrilateral ambiguous";
    pub const NOT_CENTERED: &str = "Not centered";
    pub const VALID_FRAME: &str = "Valid frame";
    pub const SNAPSHOT_TAKEN: &str = "Snapshot taken";
    pub const NO_MATCH: &str = "No match";
    pub const BACKEND_ERROR: &str = "Backend error";
    pub const REMOTE_COOLDOWN: &str = "Cooldown: Please wait a moment before scanning again.";
    pub const REMOTE_SENT: &str = "Scan sent successfully! Awaiting match...";
    pub const REMOTE_UPLOAD_FAILED: &str = "Upload failed";
    pub const WAITING_FOR_REMOTE: &str = "Waiting for scan from mobile...";
    pub const SESSION_RENEWED: &str = "Session expired, starting a new one";
    pub const SESSION_START_FAILED: &str = "Failed to start mobile scan";
    pub const POLL_FAILED: &str = "Error polling scan result";
    pub const CAMERA_STOPPED: &str = "Camera stopped";
}

/// Interval between samples for a target rate
pub fn frame_interval(fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(fps.max(1)))
}
