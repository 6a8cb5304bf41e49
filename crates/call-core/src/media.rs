//! Local media handed to the call: tracks, streams and mute state.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::VideoSize;
use crate::error::{CallError, CallResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// Capture settings reported by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackSettings {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl TrackSettings {
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
        }
    }
}

/// A capture track owned by the transport
pub trait MediaTrack: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    fn kind(&self) -> TrackKind;

    /// `None` when the engine cannot report settings; size checks are skipped then
    fn settings(&self) -> Option<TrackSettings>;

    fn set_enabled(&self, enabled: bool);

    fn is_enabled(&self) -> bool;

    fn stop(&self);
}

/// A group of tracks sent or received together
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>, tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self {
            id: id.into(),
            tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    pub fn audio_tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        self.tracks_of(TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        self.tracks_of(TrackKind::Video)
    }

    fn tracks_of(&self, kind: TrackKind) -> Vec<Arc<dyn MediaTrack>> {
        self.tracks
            .iter()
            .filter(|t| t.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn presence(&self) -> MediaPresence {
        MediaPresence {
            audio: self.tracks.iter().any(|t| t.kind() == TrackKind::Audio),
            video: self.tracks.iter().any(|t| t.kind() == TrackKind::Video),
        }
    }

    /// Shape required for the main call stream: one audio track and at most
    /// one video track within `limit`
    pub fn validate_main(&self, limit: VideoSize) -> CallResult<()> {
        if self.audio_tracks().len() != 1 {
            return Err(CallError::validation(
                "Local stream must have exactly 1 audio track",
            ));
        }
        self.validate_video(limit, "Local stream must have 0 or 1 video tracks")
    }

    /// Shape required for a content stream: no audio and at most one video
    /// track within `limit`
    pub fn validate_content(&self, limit: VideoSize) -> CallResult<()> {
        if !self.audio_tracks().is_empty() {
            return Err(CallError::validation("PC stream must have no audio track"));
        }
        self.validate_video(limit, "PC stream must have 0 or 1 video tracks")
    }

    fn validate_video(&self, limit: VideoSize, too_many: &str) -> CallResult<()> {
        let video = self.video_tracks();
        if video.len() > 1 {
            return Err(CallError::validation(too_many));
        }
        if let Some(settings) = video.first().and_then(|t| t.settings()) {
            match settings.width {
                Some(width) if width <= limit.width => {}
                _ => {
                    return Err(CallError::validation(format!(
                        "Video track width > {}px",
                        limit.width
                    )));
                }
            }
            match settings.height {
                Some(height) if height <= limit.height => {}
                _ => {
                    return Err(CallError::validation(format!(
                        "Video track height > {}px",
                        limit.height
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Which kinds of local media are being sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaPresence {
    pub audio: bool,
    pub video: bool,
}

impl MediaPresence {
    pub fn has(&self, kind: TrackKind) -> bool {
        match kind {
            TrackKind::Audio => self.audio,
            TrackKind::Video => self.video,
        }
    }
}

/// Requested mute change. `None` leaves that medium unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MuteState {
    pub audio: Option<bool>,
    pub video: Option<bool>,
}

impl MuteState {
    pub fn audio(muted: bool) -> Self {
        Self {
            audio: Some(muted),
            video: None,
        }
    }

    pub fn video(muted: bool) -> Self {
        Self {
            audio: None,
            video: Some(muted),
        }
    }
}

/// Mute status as reported by the signaling session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MuteFlags {
    pub audio: bool,
    pub video: bool,
}

impl From<MuteFlags> for MuteState {
    fn from(flags: MuteFlags) -> Self {
        Self {
            audio: Some(flags.audio),
            video: Some(flags.video),
        }
    }
}

/// Media kinds selected for a mute or unmute request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaKinds {
    pub audio: bool,
    pub video: bool,
}

impl MediaKinds {
    pub const AUDIO: MediaKinds = MediaKinds {
        audio: true,
        video: false,
    };
    pub const VIDEO: MediaKinds = MediaKinds {
        audio: false,
        video: true,
    };
    pub const ALL: MediaKinds = MediaKinds {
        audio: true,
        video: true,
    };
}
