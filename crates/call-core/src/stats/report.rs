//! Typed view of a W3C `RTCStatsReport`.
//!
//! Only the entry types the tracker and the candidate resolver read are
//! modelled; everything else deserializes to [`StatsEntry::Other`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TransportError;

/// `inbound-rtp` / `outbound-rtp` counters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpStreamStats {
    pub id: String,
    pub ssrc: u32,
    #[serde(default)]
    pub kind: Option<String>,
    /// Set by older engines on entries derived from RTCP
    #[serde(default)]
    pub is_remote: bool,
    #[serde(default)]
    pub packets_sent: Option<u64>,
    #[serde(default)]
    pub bytes_sent: Option<u64>,
    #[serde(default)]
    pub packets_received: Option<u64>,
    #[serde(default)]
    pub bytes_received: Option<u64>,
    #[serde(default)]
    pub packets_lost: Option<i64>,
    #[serde(default)]
    pub pli_count: Option<u64>,
    /// Seconds
    #[serde(default)]
    pub round_trip_time: Option<f64>,
}

/// `remote-inbound-rtp`: the far end's view of what we send
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRtpStats {
    pub id: String,
    pub ssrc: u32,
    #[serde(default)]
    pub packets_lost: Option<i64>,
    /// Seconds
    #[serde(default)]
    pub round_trip_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportStats {
    pub id: String,
    #[serde(default)]
    pub selected_candidate_pair_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatePairStats {
    pub id: String,
    pub local_candidate_id: String,
    pub remote_candidate_id: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub selected: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateStats {
    pub id: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, alias = "ipAddress")]
    pub ip: Option<String>,
    #[serde(default, alias = "portNumber")]
    pub port: Option<u16>,
    #[serde(default)]
    pub protocol: Option<String>,
}

impl CandidateStats {
    pub fn ip(&self) -> Option<&str> {
        self.address.as_deref().or(self.ip.as_deref())
    }

    pub fn is_tcp(&self) -> bool {
        self.protocol
            .as_deref()
            .is_some_and(|p| p.eq_ignore_ascii_case("tcp"))
    }
}

/// One entry of a stats report, tagged by its `type` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StatsEntry {
    InboundRtp(RtpStreamStats),
    OutboundRtp(RtpStreamStats),
    RemoteInboundRtp(RemoteRtpStats),
    Transport(TransportStats),
    CandidatePair(CandidatePairStats),
    LocalCandidate(CandidateStats),
    RemoteCandidate(CandidateStats),
    #[serde(other)]
    Other,
}

impl StatsEntry {
    pub fn id(&self) -> Option<&str> {
        match self {
            StatsEntry::InboundRtp(s) | StatsEntry::OutboundRtp(s) => Some(&s.id),
            StatsEntry::RemoteInboundRtp(s) => Some(&s.id),
            StatsEntry::Transport(s) => Some(&s.id),
            StatsEntry::CandidatePair(s) => Some(&s.id),
            StatsEntry::LocalCandidate(s) | StatsEntry::RemoteCandidate(s) => Some(&s.id),
            StatsEntry::Other => None,
        }
    }
}

/// A statistics snapshot from the transport
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatsReport {
    entries: Vec<StatsEntry>,
}

impl StatsReport {
    pub fn new(entries: Vec<StatsEntry>) -> Self {
        Self { entries }
    }

    /// Parse a report serialized either as an array of entries or as an
    /// object keyed by entry id
    pub fn from_json(json: &str) -> Result<Self, TransportError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| TransportError::stats(format!("invalid stats JSON: {}", e)))?;
        let entries = match value {
            Value::Array(items) => items,
            Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
            _ => return Err(TransportError::stats("stats JSON must be an array or an object")),
        };
        let entries = entries
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<StatsEntry>, _>>()
            .map_err(|e| TransportError::stats(format!("invalid stats entry: {}", e)))?;
        Ok(Self { entries })
    }

    pub fn push(&mut self, entry: StatsEntry) {
        self.entries.push(entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatsEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&StatsEntry> {
        self.entries.iter().find(|e| e.id() == Some(id))
    }

    /// Local `inbound-rtp` counters for an SSRC
    pub fn inbound(&self, ssrc: u32) -> Option<&RtpStreamStats> {
        self.entries.iter().find_map(|e| match e {
            StatsEntry::InboundRtp(s) if s.ssrc == ssrc && !s.is_remote => Some(s),
            _ => None,
        })
    }

    /// Local `outbound-rtp` counters for an SSRC
    pub fn outbound(&self, ssrc: u32) -> Option<&RtpStreamStats> {
        self.entries.iter().find_map(|e| match e {
            StatsEntry::OutboundRtp(s) if s.ssrc == ssrc && !s.is_remote => Some(s),
            _ => None,
        })
    }

    pub fn remote_inbound(&self, ssrc: u32) -> Option<&RemoteRtpStats> {
        self.entries.iter().find_map(|e| match e {
            StatsEntry::RemoteInboundRtp(s) if s.ssrc == ssrc => Some(s),
            _ => None,
        })
    }
}
