//! SSRC to stream-role bookkeeping.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{trace, warn};
use webcall_sdp_core::{MediaKind, SessionDescription};

use crate::signaling::Originator;

/// Whether we receive or send the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StreamDirection {
    In,
    Out,
}

impl StreamDirection {
    pub fn from_originator(originator: Originator) -> Self {
        match originator {
            Originator::Remote => StreamDirection::In,
            Originator::Local => StreamDirection::Out,
        }
    }
}

impl fmt::Display for StreamDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamDirection::In => f.write_str("in"),
            StreamDirection::Out => f.write_str("out"),
        }
    }
}

/// What a tracked stream carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StreamRole {
    Audio,
    Video,
    Content,
}

impl fmt::Display for StreamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamRole::Audio => f.write_str("audio"),
            StreamRole::Video => f.write_str("video"),
            StreamRole::Content => f.write_str("pc"),
        }
    }
}

/// A tracked stream and its counters as of the last tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SsrcEntry {
    pub ssrc: u32,
    pub direction: StreamDirection,
    pub role: StreamRole,
    /// m-line the SSRC was found on
    pub index: usize,
    pub packets: u64,
    pub bytes: u64,
    pub lost: i64,
    pub pli_count: u64,
}

impl SsrcEntry {
    pub fn new(ssrc: u32, direction: StreamDirection, role: StreamRole, index: usize) -> Self {
        Self {
            ssrc,
            direction,
            role,
            index,
            packets: 0,
            bytes: 0,
            lost: 0,
            pli_count: 0,
        }
    }
}

/// Table of tracked streams keyed by SSRC
#[derive(Debug, Default)]
pub struct SsrcTable {
    entries: BTreeMap<u32, SsrcEntry>,
}

impl SsrcTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the table from a negotiated description.
    ///
    /// Disabled lines purge every entry that came from their index. Enabled
    /// lines add their primary SSRC unless it is already tracked. The second
    /// video line is the content stream.
    pub fn process_description(&mut self, description: &SessionDescription, originator: Originator) {
        let direction = StreamDirection::from_originator(originator);
        let mut video_lines = 0;

        for (index, media) in description.media.iter().enumerate() {
            if media.kind == MediaKind::Video {
                video_lines += 1;
            }

            if media.is_disabled() {
                self.purge_index(index);
                continue;
            }

            let role = match media.kind {
                MediaKind::Audio => StreamRole::Audio,
                MediaKind::Video if video_lines > 1 => StreamRole::Content,
                MediaKind::Video => StreamRole::Video,
                _ => {
                    trace!("Not tracking {} m-line {}", media.kind, index);
                    continue;
                }
            };

            match media.primary_ssrc() {
                Some(ssrc) => {
                    self.entries
                        .entry(ssrc)
                        .or_insert_with(|| SsrcEntry::new(ssrc, direction, role, index));
                }
                None => warn!(
                    "Unusual m-line in SDP for mid={:?}, cannot find a single ssrc and no ssrc-group to assist",
                    media.mid
                ),
            }
        }
    }

    /// Remove every entry that came from m-line `index`
    pub fn purge_index(&mut self, index: usize) {
        self.entries.retain(|_, entry| entry.index != index);
    }

    pub fn get(&self, ssrc: u32) -> Option<&SsrcEntry> {
        self.entries.get(&ssrc)
    }

    pub fn get_mut(&mut self, ssrc: u32) -> Option<&mut SsrcEntry> {
        self.entries.get_mut(&ssrc)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SsrcEntry> {
        self.entries.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SsrcEntry> {
        self.entries.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
