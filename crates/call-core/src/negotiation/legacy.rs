//! Translation between one-stream-per-line descriptions and the legacy
//! layout that carries every stream of a media kind on a single line.
//!
//! The wire always carries the per-stream layout. A transport without
//! unified plan support gets remote descriptions merged per kind, and its
//! local descriptions are split back out along the layout of the last
//! per-stream description seen in either direction.

use tracing::{debug, trace};
use webcall_sdp_core::{
    Direction, Group, MediaDescription, MediaKind, SessionDescription, Source, SsrcGroup,
};

const FID: &str = "FID";
const BUNDLE: &str = "BUNDLE";

/// Sources and groups that make up one media stream
#[derive(Debug, Default)]
struct Stream {
    sources: Vec<Source>,
    groups: Vec<SsrcGroup>,
}

impl Stream {
    fn contains(&self, ssrc: u32) -> bool {
        self.sources.iter().any(|s| s.ssrc == ssrc)
    }
}

#[derive(Debug, Default)]
pub struct LegacyTranslator {
    cached: Option<SessionDescription>,
}

impl LegacyTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last per-stream description, in either direction
    pub fn cached(&self) -> Option<&SessionDescription> {
        self.cached.as_ref()
    }

    /// Merge every line of a kind into one line per kind
    pub fn to_legacy(&mut self, unified: &SessionDescription) -> SessionDescription {
        self.cached = Some(unified.clone());

        let mut legacy = unified.clone();
        legacy.media.clear();

        let mut kinds: Vec<MediaKind> = Vec::new();
        for media in &unified.media {
            if !kinds.contains(&media.kind) {
                kinds.push(media.kind.clone());
            }
        }

        let mut bundled = Vec::new();
        for kind in kinds {
            let lines: Vec<&MediaDescription> =
                unified.media.iter().filter(|m| m.kind == kind).collect();
            let active: Vec<&MediaDescription> =
                lines.iter().copied().filter(|m| !m.is_disabled()).collect();

            let Some(&base) = active.first().or(lines.first()) else {
                continue;
            };
            let mut merged = base.clone();
            merged.mid = Some(kind.as_str().to_string());
            merged.sources = active.iter().flat_map(|m| m.sources.clone()).collect();
            merged.ssrc_groups = active.iter().flat_map(|m| m.ssrc_groups.clone()).collect();
            merged.bundle_only = false;

            if active.is_empty() {
                merged.port = 0;
                merged.direction = Some(Direction::Inactive);
            } else {
                let directions: Vec<Direction> = active
                    .iter()
                    .map(|m| m.direction.unwrap_or(Direction::SendRecv))
                    .collect();
                merged.direction = Some(Direction::from_parts(
                    directions.iter().any(Direction::sends),
                    directions.iter().any(Direction::receives),
                ));
                bundled.push(kind.as_str().to_string());
            }
            trace!(
                "Merged {} {} line(s) into one, {} active",
                lines.len(),
                kind,
                active.len()
            );
            legacy.media.push(merged);
        }

        if let Some(group) = legacy.bundle_group_mut() {
            group.mids = bundled;
        }
        debug!("Translated {} lines to {} legacy lines", unified.media.len(), legacy.media.len());
        legacy
    }

    /// Split legacy lines back into one line per stream
    pub fn to_unified(&mut self, legacy: &SessionDescription) -> SessionDescription {
        let mut unified = legacy.clone();
        unified.media.clear();

        // Per-stream lines of each legacy line, in stream order
        let mut split: Vec<(MediaKind, Vec<MediaDescription>)> = legacy
            .media
            .iter()
            .map(|line| (line.kind.clone(), self.split_line(line)))
            .collect();

        if let Some(cached) = &self.cached {
            for slot in &cached.media {
                let next = split
                    .iter_mut()
                    .find(|(kind, lines)| *kind == slot.kind && !lines.is_empty())
                    .map(|(_, lines)| lines.remove(0));
                if let Some(line) = next {
                    unified.media.push(line);
                }
            }
        }
        for (_, lines) in split {
            for mut line in lines {
                if line.mid.is_none() {
                    line.mid = Some(unified.media.len().to_string());
                }
                unified.media.push(line);
            }
        }

        let mids: Vec<String> = unified
            .media
            .iter()
            .filter(|m| !m.is_disabled())
            .filter_map(|m| m.mid.clone())
            .collect();
        match unified.bundle_group_mut() {
            Some(group) => group.mids = mids,
            None if !legacy.groups.is_empty() || self.cached.is_some() => {
                unified.groups.push(Group {
                    semantics: BUNDLE.to_string(),
                    mids,
                });
            }
            None => {}
        }

        debug!("Translated {} legacy lines to {} lines", legacy.media.len(), unified.media.len());
        self.cached = Some(unified.clone());
        unified
    }

    /// Lines for one legacy line. The first lines follow the cached layout
    /// of the same kind; streams beyond it become new send-only lines whose
    /// mid is assigned on insertion.
    fn split_line(&self, line: &MediaDescription) -> Vec<MediaDescription> {
        let slots: Vec<&MediaDescription> = self
            .cached
            .iter()
            .flat_map(|c| c.media.iter())
            .filter(|m| m.kind == line.kind)
            .collect();
        let mut streams = split_streams(line).into_iter();

        let mut template = line.clone();
        template.sources.clear();
        template.ssrc_groups.clear();

        let mut lines = Vec::new();
        for index in 0..slots.len().max(1) {
            let mut out = template.clone();
            if let Some(slot) = slots.get(index) {
                out.mid = slot.mid.clone();
            }
            let slot_disabled = slots.get(index).is_some_and(|s| s.is_disabled());

            match streams.next() {
                Some(stream) if !line.is_disabled() => {
                    out.sources = stream.sources;
                    out.ssrc_groups = stream.groups;
                }
                _ if line.is_disabled() || slot_disabled => {
                    out.port = 0;
                    out.direction = Some(Direction::Inactive);
                }
                _ => {
                    let receives = line.direction.unwrap_or(Direction::SendRecv).receives();
                    out.direction = Some(Direction::from_parts(false, receives));
                }
            }
            lines.push(out);
        }

        if !line.is_disabled() {
            for stream in streams {
                let mut out = template.clone();
                out.mid = None;
                out.direction = Some(Direction::SendOnly);
                out.sources = stream.sources;
                out.ssrc_groups = stream.groups;
                lines.push(out);
            }
        }
        lines
    }
}

/// Group the sources of a line into streams: FID pairs first, then shared
/// msid, then one stream per remaining source
fn split_streams(line: &MediaDescription) -> Vec<Stream> {
    let mut streams: Vec<Stream> = Vec::new();

    for group in line.ssrc_groups.iter().filter(|g| g.semantics == FID) {
        if group.ssrcs.iter().any(|ssrc| streams.iter().any(|s| s.contains(*ssrc))) {
            continue;
        }
        streams.push(Stream {
            sources: group
                .ssrcs
                .iter()
                .filter_map(|ssrc| line.source(*ssrc).cloned())
                .collect(),
            groups: Vec::new(),
        });
    }

    for source in &line.sources {
        if streams.iter().any(|s| s.contains(source.ssrc)) {
            continue;
        }
        let msid = source.attribute("msid");
        let existing = msid.and_then(|msid| {
            streams.iter_mut().find(|s| {
                s.sources.first().and_then(|first| first.attribute("msid")) == Some(msid)
            })
        });
        match existing {
            Some(stream) => stream.sources.push(source.clone()),
            None => streams.push(Stream {
                sources: vec![source.clone()],
                groups: Vec::new(),
            }),
        }
    }

    // Every group travels with the stream holding its first SSRC
    for group in &line.ssrc_groups {
        let Some(first) = group.ssrcs.first() else {
            continue;
        };
        if let Some(stream) = streams.iter_mut().find(|s| s.contains(*first)) {
            stream.groups.push(group.clone());
        }
    }
    streams
}
