//! Content (presentation) channel state and tagging.

use std::fmt;

use serde::{Deserialize, Serialize};
use webcall_sdp_core::{Direction, SessionDescription};

use crate::signaling::{Originator, SdpKind};

/// `a=content` value of the main video line
pub const CONTENT_MAIN: &str = "main";
/// `a=content` value of the presentation line
pub const CONTENT_SLIDES: &str = "slides";

/// Line index of the content line when no line is tagged
const DEFAULT_CONTENT_LINE: usize = 2;

/// State of the content channel as seen from this endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentState {
    #[default]
    Disabled,
    Send,
    Recv,
}

impl fmt::Display for ContentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentState::Disabled => f.write_str("disabled"),
            ContentState::Send => f.write_str("send"),
            ContentState::Recv => f.write_str("recv"),
        }
    }
}

/// Derive the content state from a description.
///
/// Only descriptions with a bundle group are considered. For an active
/// `slides` line the direction decides, read from this endpoint's point of
/// view. A disabled `slides` line in an offer still means we are about to
/// send when it is bundled and marked `bundle-only`.
pub fn content_state(
    description: &SessionDescription,
    originator: Originator,
    kind: SdpKind,
) -> ContentState {
    let Some(bundle) = description.bundle_group() else {
        return ContentState::Disabled;
    };

    let mut state = ContentState::Disabled;
    for media in &description.media {
        if media.content.as_deref() != Some(CONTENT_SLIDES) {
            continue;
        }
        if !media.is_disabled() {
            let sending = match originator {
                Originator::Local => media.direction == Some(Direction::SendOnly),
                Originator::Remote => media.direction == Some(Direction::RecvOnly),
            };
            state = if sending {
                ContentState::Send
            } else {
                ContentState::Recv
            };
        } else if kind == SdpKind::Offer {
            let bundled = media
                .mid
                .as_ref()
                .is_some_and(|mid| bundle.mids.contains(mid));
            if bundled && media.bundle_only {
                state = ContentState::Send;
            }
        }
    }
    state
}

/// True when the main video line (index 1) is disabled
pub fn is_audio_only(description: &SessionDescription) -> bool {
    description
        .media
        .get(1)
        .is_some_and(|media| media.is_disabled())
}

/// Tag the video lines of a local description.
///
/// The first video line is the main line; without local video it only
/// receives. Every later video line carries content and is send-only unless
/// it was already receive-only.
pub fn tag_content(session: &mut SessionDescription, has_local_video: bool) {
    let mut seen_main = false;
    for media in session.media.iter_mut().filter(|m| m.is_video()) {
        if !seen_main {
            seen_main = true;
            media.content = Some(CONTENT_MAIN.to_string());
            if !has_local_video {
                media.direction = Some(Direction::RecvOnly);
            }
        } else {
            if media.direction != Some(Direction::RecvOnly) {
                media.direction = Some(Direction::SendOnly);
            }
            media.content = Some(CONTENT_SLIDES.to_string());
        }
    }
}

/// Index of the content line
pub fn content_line_index(description: &SessionDescription) -> usize {
    description
        .media
        .iter()
        .position(|m| m.content.as_deref() == Some(CONTENT_SLIDES))
        .unwrap_or(DEFAULT_CONTENT_LINE)
}
