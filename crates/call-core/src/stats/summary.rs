use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ssrc::{StreamDirection, StreamRole};

/// Per-period figures for one tracked stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamSummary {
    pub ssrc: u32,
    pub role: StreamRole,
    pub direction: StreamDirection,
    /// Packets per second over the period
    pub packet_rate: Option<f64>,
    pub kbps: Option<f64>,
    /// Packets lost during the period (receive streams)
    pub lost: Option<i64>,
    /// PLIs received during the period (video send streams)
    pub pli_count: Option<i64>,
    /// Round trip time in milliseconds (send streams)
    pub rtt_ms: Option<f64>,
    pub collected_at: DateTime<Utc>,
}

impl StreamSummary {
    pub fn new(ssrc: u32, role: StreamRole, direction: StreamDirection) -> Self {
        Self {
            ssrc,
            role,
            direction,
            packet_rate: None,
            kbps: None,
            lost: None,
            pli_count: None,
            rtt_ms: None,
            collected_at: Utc::now(),
        }
    }
}

impl fmt::Display for StreamSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}:", self.role, self.direction)?;
        match self.packet_rate {
            Some(rate) => write!(f, " pkts/s={}", rate as i64)?,
            None => f.write_str(" pkts/s=unknown")?,
        }
        match self.kbps {
            Some(kbps) => write!(f, " kbps={}", kbps as i64)?,
            None => f.write_str(" kbps=unknown")?,
        }
        if let Some(lost) = self.lost {
            write!(f, " lost={}", lost)?;
        }
        if let Some(plis) = self.pli_count {
            write!(f, " plis={}", plis)?;
        }
        if let Some(rtt) = self.rtt_ms {
            write!(f, " rtt={}", rtt as i64)?;
        }
        Ok(())
    }
}
