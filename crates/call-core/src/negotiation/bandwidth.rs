//! Bandwidth shaping of remote descriptions.

use tracing::{debug, info};
use webcall_sdp_core::{Bandwidth, Direction, SessionDescription};

use super::content::{CONTENT_MAIN, CONTENT_SLIDES};
use crate::config::BandwidthPolicy;

/// Rewrite the `b=` lines of the tagged video lines of a remote description.
///
/// * A tagged line that lists feedback but no `goog-remb` is capped at
///   `max_bps_without_bwe`.
/// * With both a main line and a receive-only content line, the main line
///   is set to the floor and the content line gets its cap minus the floor,
///   never less than the floor. Skipped in legacy mode, where both share a
///   single line on the transport.
/// * With `add_as`, every line whose first bandwidth is TIAS also gets the
///   equivalent AS line.
pub fn shape_bandwidth(
    session: &mut SessionDescription,
    policy: &BandwidthPolicy,
    legacy: bool,
    add_as: bool,
) {
    let mut main_line = None;
    let mut content_line = None;

    for (index, media) in session.media.iter_mut().enumerate() {
        if !media.is_video() {
            continue;
        }
        let Some(content) = media.content.as_deref() else {
            continue;
        };

        if content == CONTENT_MAIN {
            main_line = Some(index);
        } else if content == CONTENT_SLIDES && media.direction == Some(Direction::RecvOnly) {
            content_line = Some(index);
        }

        if !media.rtcp_fb.is_empty() && !media.bandwidth.is_empty() && !media.has_goog_remb() {
            info!(
                "bwe disabled, hard capping send bandwidth to {} kbps",
                policy.max_bps_without_bwe / 1000
            );
            media.bandwidth[0].limit = policy.max_bps_without_bwe;
        }
    }

    if let (Some(main), Some(content), false) = (main_line, content_line, legacy) {
        let content_limit = session.media[content].bandwidth.first().map(|b| b.limit);
        let has_main_limit = !session.media[main].bandwidth.is_empty();
        if let (Some(content_limit), true) = (content_limit, has_main_limit) {
            let floor = policy.min_video_bps;
            let content_target = content_limit.saturating_sub(floor).max(floor);
            session.media[main].bandwidth[0].limit = floor;
            session.media[content].bandwidth[0].limit = content_target;
            debug!(
                "Split video bandwidth: main={} content={}",
                floor, content_target
            );
        }
    }

    if add_as {
        for media in session.media.iter_mut() {
            let as_limit = match media.bandwidth.first() {
                Some(b) if b.bw_type == "TIAS" => b.limit / 1000,
                _ => continue,
            };
            media.bandwidth.push(Bandwidth::new("AS", as_limit));
        }
    }
}
