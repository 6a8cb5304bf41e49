//! SSRC/stats tracker
//!
//! Maps SSRCs found in negotiated descriptions to stream roles and turns raw
//! transport counters into per-period rate, loss and RTT figures.

pub mod report;
pub mod ssrc;
pub mod summary;
pub mod tracker;

pub use report::{
    CandidatePairStats, CandidateStats, RemoteRtpStats, RtpStreamStats, StatsEntry, StatsReport,
    TransportStats,
};
pub use ssrc::{SsrcEntry, SsrcTable, StreamDirection, StreamRole};
pub use summary::StreamSummary;
pub use tracker::StatsTracker;
