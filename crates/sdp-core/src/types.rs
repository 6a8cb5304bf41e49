//! Structured view of a session description.
//!
//! The model keeps the attributes the call layer rewrites as typed fields and
//! carries every other attribute through untouched in `attributes`, so that a
//! parse followed by a write preserves what the remote end sent.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Media type of an m= line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MediaKind {
    #[default]
    Audio,
    Video,
    Application,
    Other(String),
}

impl MediaKind {
    pub fn from_token(token: &str) -> Self {
        match token {
            "audio" => MediaKind::Audio,
            "video" => MediaKind::Video,
            "application" => MediaKind::Application,
            other => MediaKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Application => "application",
            MediaKind::Other(token) => token,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media direction attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl Direction {
    pub fn from_attribute(name: &str) -> Option<Self> {
        match name {
            "sendrecv" => Some(Direction::SendRecv),
            "sendonly" => Some(Direction::SendOnly),
            "recvonly" => Some(Direction::RecvOnly),
            "inactive" => Some(Direction::Inactive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::SendRecv => "sendrecv",
            Direction::SendOnly => "sendonly",
            Direction::RecvOnly => "recvonly",
            Direction::Inactive => "inactive",
        }
    }

    pub fn sends(&self) -> bool {
        matches!(self, Direction::SendRecv | Direction::SendOnly)
    }

    pub fn receives(&self) -> bool {
        matches!(self, Direction::SendRecv | Direction::RecvOnly)
    }

    /// Build a direction from its send and receive halves
    pub fn from_parts(sends: bool, receives: bool) -> Self {
        match (sends, receives) {
            (true, true) => Direction::SendRecv,
            (true, false) => Direction::SendOnly,
            (false, true) => Direction::RecvOnly,
            (false, false) => Direction::Inactive,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// o= line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub username: String,
    pub session_id: String,
    pub session_version: String,
    pub net_type: String,
    pub addr_type: String,
    pub address: String,
}

impl Default for Origin {
    fn default() -> Self {
        Self {
            username: "-".to_string(),
            session_id: "0".to_string(),
            session_version: "0".to_string(),
            net_type: "IN".to_string(),
            addr_type: "IP4".to_string(),
            address: "127.0.0.1".to_string(),
        }
    }
}

/// t= line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Timing {
    pub start: u64,
    pub stop: u64,
}

/// c= line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub net_type: String,
    pub addr_type: String,
    pub address: String,
}

impl Connection {
    /// An IN IP4 connection line for the given address
    pub fn ip4(address: impl Into<String>) -> Self {
        Self {
            net_type: "IN".to_string(),
            addr_type: "IP4".to_string(),
            address: address.into(),
        }
    }
}

/// b= line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bandwidth {
    pub bw_type: String,
    pub limit: u64,
}

impl Bandwidth {
    pub fn new(bw_type: impl Into<String>, limit: u64) -> Self {
        Self {
            bw_type: bw_type.into(),
            limit,
        }
    }
}

/// a=group line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub semantics: String,
    pub mids: Vec<String>,
}

/// Attribute without a dedicated field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}:{}", self.name, value),
            None => f.write_str(&self.name),
        }
    }
}

/// a=rtpmap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtpMap {
    pub payload: u8,
    pub codec: String,
    pub rate: u32,
    pub encoding: Option<String>,
}

/// a=fmtp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fmtp {
    pub payload: u8,
    pub config: String,
}

/// a=rtcp-fb. The payload is kept as text because `*` is allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtcpFeedback {
    pub payload: String,
    pub fb_type: String,
    pub subtype: Option<String>,
}

impl RtcpFeedback {
    pub fn applies_to(&self, payload: u8) -> bool {
        self.payload == "*" || self.payload.parse::<u8>().ok() == Some(payload)
    }
}

/// All a=ssrc lines that share one SSRC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub ssrc: u32,
    pub attributes: Vec<Attribute>,
}

impl Source {
    pub fn new(ssrc: u32) -> Self {
        Self {
            ssrc,
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute::new(name, Some(value.into())));
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .and_then(|a| a.value.as_deref())
    }
}

/// a=ssrc-group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsrcGroup {
    pub semantics: String,
    pub ssrcs: Vec<u32>,
}

/// One m= section and its attributes
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaDescription {
    pub kind: MediaKind,
    pub port: u16,
    pub port_count: Option<u16>,
    pub protocol: String,
    pub formats: Vec<String>,
    pub connection: Option<Connection>,
    pub bandwidth: Vec<Bandwidth>,
    pub mid: Option<String>,
    pub direction: Option<Direction>,
    pub rtcp_mux: bool,
    pub rtcp_rsize: bool,
    pub ice_ufrag: Option<String>,
    pub ice_pwd: Option<String>,
    /// a=content (RFC 4796)
    pub content: Option<String>,
    pub bundle_only: bool,
    pub rtp: Vec<RtpMap>,
    pub fmtp: Vec<Fmtp>,
    pub rtcp_fb: Vec<RtcpFeedback>,
    pub sources: Vec<Source>,
    pub ssrc_groups: Vec<SsrcGroup>,
    /// Raw a=candidate values
    pub candidates: Vec<String>,
    pub remote_candidates: Option<String>,
    pub end_of_candidates: bool,
    pub attributes: Vec<Attribute>,
}

impl MediaDescription {
    pub fn new(kind: MediaKind, port: u16, protocol: impl Into<String>) -> Self {
        Self {
            kind,
            port,
            protocol: protocol.into(),
            ..Default::default()
        }
    }

    /// A port of zero rejects or disables the line
    pub fn is_disabled(&self) -> bool {
        self.port == 0
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }

    /// Payload types whose rtpmap names `codec`, compared case-insensitively
    pub fn codec_payloads(&self, codec: &str) -> Vec<u8> {
        self.rtp
            .iter()
            .filter(|map| map.codec.eq_ignore_ascii_case(codec))
            .map(|map| map.payload)
            .collect()
    }

    pub fn fmtp_for(&self, payload: u8) -> Option<&Fmtp> {
        self.fmtp.iter().find(|f| f.payload == payload)
    }

    pub fn fmtp_for_mut(&mut self, payload: u8) -> Option<&mut Fmtp> {
        self.fmtp.iter_mut().find(|f| f.payload == payload)
    }

    /// Drop payload types from the format list and every attribute that names them
    pub fn remove_payloads(&mut self, payloads: &[u8]) {
        if payloads.is_empty() {
            return;
        }
        self.formats
            .retain(|f| f.parse::<u8>().map_or(true, |pt| !payloads.contains(&pt)));
        self.rtp.retain(|m| !payloads.contains(&m.payload));
        self.fmtp.retain(|f| !payloads.contains(&f.payload));
        self.rtcp_fb.retain(|fb| {
            fb.payload
                .parse::<u8>()
                .map_or(true, |pt| !payloads.contains(&pt))
        });
    }

    pub fn source(&self, ssrc: u32) -> Option<&Source> {
        self.sources.iter().find(|s| s.ssrc == ssrc)
    }

    /// The SSRC identifying the stream carried by this line.
    ///
    /// A line with exactly one source yields it; otherwise the primary SSRC
    /// of a leading FID group (RFC 4588 retransmission pairing) is used.
    pub fn primary_ssrc(&self) -> Option<u32> {
        if self.sources.len() == 1 {
            return Some(self.sources[0].ssrc);
        }
        self.ssrc_groups
            .first()
            .filter(|group| group.semantics == "FID")
            .and_then(|group| group.ssrcs.first().copied())
    }

    pub fn has_goog_remb(&self) -> bool {
        self.rtcp_fb.iter().any(|fb| fb.fb_type == "goog-remb")
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// A complete session description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub version: u32,
    pub origin: Origin,
    pub session_name: String,
    pub timing: Timing,
    pub connection: Option<Connection>,
    pub bandwidth: Vec<Bandwidth>,
    pub groups: Vec<Group>,
    pub msid_semantic: Option<String>,
    pub ice_ufrag: Option<String>,
    pub ice_pwd: Option<String>,
    pub ice_options: Option<String>,
    pub fingerprint: Option<String>,
    pub attributes: Vec<Attribute>,
    pub media: Vec<MediaDescription>,
}

impl Default for SessionDescription {
    fn default() -> Self {
        Self {
            version: 0,
            origin: Origin::default(),
            session_name: "-".to_string(),
            timing: Timing::default(),
            connection: None,
            bandwidth: Vec::new(),
            groups: Vec::new(),
            msid_semantic: None,
            ice_ufrag: None,
            ice_pwd: None,
            ice_options: None,
            fingerprint: None,
            attributes: Vec::new(),
            media: Vec::new(),
        }
    }
}

impl SessionDescription {
    /// The BUNDLE group, or the first group when none is labelled BUNDLE
    pub fn bundle_group(&self) -> Option<&Group> {
        self.groups
            .iter()
            .find(|g| g.semantics == "BUNDLE")
            .or_else(|| self.groups.first())
    }

    pub fn bundle_group_mut(&mut self) -> Option<&mut Group> {
        let index = self
            .groups
            .iter()
            .position(|g| g.semantics == "BUNDLE")
            .or(if self.groups.is_empty() { None } else { Some(0) })?;
        self.groups.get_mut(index)
    }

    pub fn count_kind(&self, kind: &MediaKind) -> usize {
        self.media.iter().filter(|m| &m.kind == kind).count()
    }
}
