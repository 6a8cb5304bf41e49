//! Call configuration
//!
//! A [`CallConfig`] is built once per call and is immutable after `dial`.
//! Every section has defaults, so a JSON document only needs to name what it
//! changes:
//!
//! ```rust
//! use webcall_call_core::config::CallConfig;
//!
//! let config = CallConfig::from_json(
//!     r#"{ "target": "room@example.com", "domain": "example.com", "display_name": "Ada",
//!          "timings": { "connection_timeout_ms": 5000 } }"#,
//! ).unwrap();
//!
//! assert_eq!(config.timings.connection_timeout_ms, 5000);
//! assert_eq!(config.timings.stats_period_ms, 10_000);
//! assert_eq!(config.bandwidth.min_video_bps, 200_000);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CallError, CallResult};

/// Longest display name sent to the signaling server, in characters
pub const MAX_DISPLAY_NAME_CHARS: usize = 100;

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSize {
    pub width: u32,
    pub height: u32,
}

impl VideoSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Capture limits for the main and content video tracks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaLimits {
    pub main_video: VideoSize,
    pub content_video: VideoSize,
}

impl Default for MediaLimits {
    fn default() -> Self {
        Self {
            main_video: VideoSize::new(1280, 720),
            content_video: VideoSize::new(1920, 1088),
        }
    }
}

/// Send bitrate policy applied to video lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandwidthPolicy {
    /// Floor for each of the main and content video lines
    pub min_video_bps: u64,
    /// Hard cap when the far end does not do receiver-side estimation
    pub max_bps_without_bwe: u64,
}

impl Default for BandwidthPolicy {
    fn default() -> Self {
        Self {
            min_video_bps: 200_000,
            max_bps_without_bwe: 512_000,
        }
    }
}

/// Timer settings, all in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallTimings {
    pub connection_timeout_ms: u64,
    pub stats_period_ms: u64,
    pub hangup_grace_ms: u64,
    pub content_retry_ms: u64,
    pub candidate_retry_ms: u64,
}

impl Default for CallTimings {
    fn default() -> Self {
        Self {
            connection_timeout_ms: 10_000,
            stats_period_ms: 10_000,
            hangup_grace_ms: 1_000,
            content_retry_ms: 500,
            candidate_retry_ms: 500,
        }
    }
}

impl CallTimings {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn stats_period(&self) -> Duration {
        Duration::from_millis(self.stats_period_ms)
    }

    pub fn hangup_grace(&self) -> Duration {
        Duration::from_millis(self.hangup_grace_ms)
    }

    pub fn content_retry(&self) -> Duration {
        Duration::from_millis(self.content_retry_ms)
    }

    pub fn candidate_retry(&self) -> Duration {
        Duration::from_millis(self.candidate_retry_ms)
    }
}

/// Configuration of a single call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Dial target, sent as `sip:<target>`
    pub target: String,
    /// Signaling domain, also used for the websocket address
    pub domain: String,
    pub display_name: String,
    pub websocket_port: u16,
    /// Allow H.264 on video lines; when false it is stripped from every description
    pub allow_h264: bool,
    /// Log full SDP bodies at debug level
    pub log_sdp: bool,
    pub media: MediaLimits,
    pub bandwidth: BandwidthPolicy,
    pub timings: CallTimings,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            domain: String::new(),
            display_name: String::new(),
            websocket_port: 443,
            allow_h264: true,
            log_sdp: false,
            media: MediaLimits::default(),
            bandwidth: BandwidthPolicy::default(),
            timings: CallTimings::default(),
        }
    }
}

impl CallConfig {
    pub fn new(
        target: impl Into<String>,
        domain: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            domain: domain.into(),
            display_name: display_name.into(),
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> CallResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| CallError::validation(format!("Invalid call configuration: {}", e)))
    }

    pub fn with_allow_h264(mut self, allow: bool) -> Self {
        self.allow_h264 = allow;
        self
    }

    pub fn with_log_sdp(mut self, log_sdp: bool) -> Self {
        self.log_sdp = log_sdp;
        self
    }

    pub fn with_websocket_port(mut self, port: u16) -> Self {
        self.websocket_port = port;
        self
    }

    pub fn with_media_limits(mut self, media: MediaLimits) -> Self {
        self.media = media;
        self
    }

    pub fn with_bandwidth_policy(mut self, bandwidth: BandwidthPolicy) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    pub fn with_timings(mut self, timings: CallTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Check required fields and normalize the display name.
    ///
    /// Names longer than [`MAX_DISPLAY_NAME_CHARS`] characters are truncated.
    pub fn validate(mut self) -> CallResult<Self> {
        if self.display_name.trim().is_empty() {
            return Err(CallError::validation("Display name is required"));
        }
        if self.target.trim().is_empty() {
            return Err(CallError::validation("Dial target is required"));
        }
        if self.domain.trim().is_empty() {
            return Err(CallError::validation("Signaling domain is required"));
        }
        if self.timings.stats_period_ms == 0 {
            return Err(CallError::validation("Stats period must be non-zero"));
        }
        if self.display_name.chars().count() > MAX_DISPLAY_NAME_CHARS {
            self.display_name = self
                .display_name
                .chars()
                .take(MAX_DISPLAY_NAME_CHARS)
                .collect();
            debug!("Display name truncated to {} characters", MAX_DISPLAY_NAME_CHARS);
        }
        Ok(self)
    }
}
