// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON under the platform config directory. Missing fields fall
//! back to the defaults in [`crate::constants`], so older files keep loading.

use crate::constants::{self, api, detection, manual_capture, remote, sampling, voting};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable overriding the backend URL
pub const ENV_API_URL: &str = "CARD_SCANNER_API_URL";

/// Environment variable carrying the bearer token for session creation
pub const ENV_TOKEN: &str = "CARD_SCANNER_TOKEN";

/// Tunables of the capture, gating and voting pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Minimum per-corner keypoint confidence
    pub confidence_threshold: f64,
    /// Margin ratio per side for the centering check
    pub center_margin_ratio: f64,
    /// Minimum quad area relative to the frame area
    pub min_area_ratio: f64,
    /// Minimum Laplacian variance
    pub focus_threshold: f64,
    /// Voting window capacity
    pub window_size: usize,
    /// Valid outcomes required in the window to trigger
    pub required_valid: usize,
    /// Cooldown after an automatic trigger
    pub cooldown_ms: u64,
    /// Process one of every N sampled frames
    pub skip_factor: u32,
    /// Sampling rate cap
    pub target_fps: u32,
    /// Detector input tile size
    pub tile_size: u32,
    pub manual_width_ratio: f64,
    pub manual_height_ratio: f64,
    pub manual_min_width: u32,
    pub manual_min_height: u32,
    /// Manual capture cooldown in sampling intervals
    pub manual_cooldown_frames: u32,
    /// Minimum gap between uploads from a second device
    pub remote_submit_cooldown_ms: u64,
    /// Abandon a detection request after this long
    pub reply_timeout_ms: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: detection::CONFIDENCE_THRESHOLD,
            center_margin_ratio: detection::CENTER_MARGIN_RATIO,
            min_area_ratio: detection::MIN_AREA_RATIO,
            focus_threshold: detection::FOCUS_THRESHOLD,
            window_size: voting::WINDOW_SIZE,
            required_valid: voting::REQUIRED_VALID,
            cooldown_ms: voting::COOLDOWN_MS,
            skip_factor: sampling::SKIP_FACTOR,
            target_fps: sampling::TARGET_FPS,
            tile_size: detection::TILE_SIZE,
            manual_width_ratio: manual_capture::WIDTH_RATIO,
            manual_height_ratio: manual_capture::HEIGHT_RATIO,
            manual_min_width: manual_capture::MIN_WIDTH,
            manual_min_height: manual_capture::MIN_HEIGHT,
            manual_cooldown_frames: manual_capture::COOLDOWN_FRAMES,
            remote_submit_cooldown_ms: remote::SUBMIT_COOLDOWN_MS,
            reply_timeout_ms: detection::REPLY_TIMEOUT_MS,
        }
    }
}

impl ScannerConfig {
    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> AppResult<()> {
        if self.window_size == 0 {
            return Err(AppError::Config("window_size must be at least 1".into()));
        }
        if self.required_valid == 0 || self.required_valid > self.window_size {
            return Err(AppError::Config(format!(
                "required_valid must be within 1..={} (got {})",
                self.window_size, self.required_valid
            )));
        }
        if self.tile_size == 0 {
            return Err(AppError::Config("tile_size must be positive".into()));
        }
        if self.target_fps == 0 || self.skip_factor == 0 {
            return Err(AppError::Config(
                "target_fps and skip_factor must be positive".into(),
            ));
        }
        // A zero margin is allowed; the other ratios describe a non-empty area
        if !(0.0..=0.5).contains(&self.center_margin_ratio) {
            return Err(AppError::Config(format!(
                "center_margin_ratio must be within 0..=0.5 (got {})",
                self.center_margin_ratio
            )));
        }
        let ratios = [
            ("min_area_ratio", self.min_area_ratio),
            ("manual_width_ratio", self.manual_width_ratio),
            ("manual_height_ratio", self.manual_height_ratio),
        ];
        for (name, value) in ratios {
            if !(value > 0.0 && value <= 1.0) {
                return Err(AppError::Config(format!(
                    "{} must be within (0, 1] (got {})",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Minimum time between two sampled frames
    pub fn frame_interval(&self) -> Duration {
        constants::frame_interval(self.target_fps)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Manual capture cooldown, derived from the sampling interval
    pub fn manual_cooldown(&self) -> Duration {
        self.frame_interval() * self.manual_cooldown_frames
    }

    pub fn remote_submit_cooldown(&self) -> Duration {
        Duration::from_millis(self.remote_submit_cooldown_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

/// Remote session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Interval between result polls
    pub poll_interval_ms: u64,
    /// Lifetime the backend grants a session
    pub session_ttl_minutes: i64,
    /// Base of the join URL encoded in the QR code
    pub join_url_base: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: remote::POLL_INTERVAL_MS,
            session_ttl_minutes: remote::SESSION_TTL_MINUTES,
            join_url_base: remote::DEFAULT_JOIN_URL_BASE.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_ttl_minutes)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Recognition backend base URL
    pub api_base_url: String,
    /// Bearer token for remote session creation
    pub auth_token: Option<String>,
    pub scanner: ScannerConfig,
    pub session: SessionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: api::DEFAULT_BASE_URL.to_string(),
            auth_token: None,
            scanner: ScannerConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Config {
    /// Default location: `<config dir>/card-scanner/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(constants::APP_NAME).join("config.json"))
    }

    /// Load from the default location with environment overrides applied
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load() -> AppResult<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.scanner.validate()?;
        Ok(config)
    }

    /// Load from an explicit path without environment overrides
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Write as pretty JSON, creating the parent directory if needed
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Apply overrides from a variable lookup (normally the process environment)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            debug!(url = %url, "Backend URL overridden from environment");
            self.api_base_url = url.trim().to_string();
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.auth_token = Some(token.trim().to_string());
        }
    }
}
