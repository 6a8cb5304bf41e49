//! Periodic statistics collection for the tracked streams.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, error, trace};
use webcall_sdp_core::SessionDescription;

use super::report::StatsReport;
use super::ssrc::{SsrcEntry, SsrcTable, StreamDirection};
use super::summary::StreamSummary;
use crate::signaling::Originator;
use crate::transport::StatsSource;

/// Owns the SSRC table of one call and the timer that polls the transport
pub struct StatsTracker {
    period: Duration,
    table: Arc<Mutex<SsrcTable>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StatsTracker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            table: Arc::new(Mutex::new(SsrcTable::new())),
            task: Mutex::new(None),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start polling `source` once per period. Does nothing if already running.
    pub fn start(&self, source: Arc<dyn StatsSource>) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }
        debug!("Starting stats timer");

        let table = self.table.clone();
        let period = self.period;
        *task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                poll_once(&table, source.as_ref(), period).await;
            }
        }));
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    /// Cancel the timer and forget every tracked stream
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            debug!("Stopping stats timer");
            task.abort();
        }
        self.table.lock().clear();
    }

    pub fn process_description(&self, description: &SessionDescription, originator: Originator) {
        self.table.lock().process_description(description, originator);
    }

    /// Run one collection outside the timer
    pub async fn poll(&self, source: &dyn StatsSource) -> Vec<StreamSummary> {
        poll_once(&self.table, source, self.period).await
    }

    /// Apply a report to the table and return the per-stream figures
    pub fn collect(&self, report: &StatsReport) -> Vec<StreamSummary> {
        collect(&mut self.table.lock(), report, self.period)
    }

    pub fn entries(&self) -> Vec<SsrcEntry> {
        self.table.lock().iter().cloned().collect()
    }
}

impl Drop for StatsTracker {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

async fn poll_once(
    table: &Mutex<SsrcTable>,
    source: &dyn StatsSource,
    period: Duration,
) -> Vec<StreamSummary> {
    match source.get_stats().await {
        Ok(report) => {
            let summaries = collect(&mut table.lock(), &report, period);
            for summary in &summaries {
                debug!("{}", summary);
            }
            summaries
        }
        Err(e) => {
            error!("Failed to get stats because: {}", e);
            Vec::new()
        }
    }
}

fn delta(current: u64, previous: u64) -> f64 {
    current as f64 - previous as f64
}

fn collect(table: &mut SsrcTable, report: &StatsReport, period: Duration) -> Vec<StreamSummary> {
    let seconds = period.as_secs_f64();
    let mut summaries = Vec::new();

    for entry in table.iter_mut() {
        let mut summary = StreamSummary::new(entry.ssrc, entry.role, entry.direction);
        match entry.direction {
            StreamDirection::Out => {
                let Some(stats) = report.outbound(entry.ssrc) else {
                    trace!("No outbound counters for ssrc {} yet", entry.ssrc);
                    continue;
                };
                if let (Some(packets), Some(bytes)) = (stats.packets_sent, stats.bytes_sent) {
                    summary.packet_rate = Some(delta(packets, entry.packets) / seconds);
                    summary.kbps = Some(delta(bytes, entry.bytes) * 8.0 / (seconds * 1000.0));
                    entry.packets = packets;
                    entry.bytes = bytes;
                }
                if let Some(plis) = stats.pli_count {
                    summary.pli_count = Some(plis as i64 - entry.pli_count as i64);
                    entry.pli_count = plis;
                }
                summary.rtt_ms = stats
                    .round_trip_time
                    .or_else(|| {
                        report
                            .remote_inbound(entry.ssrc)
                            .and_then(|remote| remote.round_trip_time)
                    })
                    .map(|rtt| rtt * 1000.0);
            }
            StreamDirection::In => {
                let Some(stats) = report.inbound(entry.ssrc) else {
                    trace!("No inbound counters for ssrc {} yet", entry.ssrc);
                    continue;
                };
                if let (Some(packets), Some(bytes)) = (stats.packets_received, stats.bytes_received)
                {
                    summary.packet_rate = Some(delta(packets, entry.packets) / seconds);
                    summary.kbps = Some(delta(bytes, entry.bytes) * 8.0 / (seconds * 1000.0));
                    entry.packets = packets;
                    entry.bytes = bytes;
                }
                if let Some(lost) = stats.packets_lost {
                    summary.lost = Some(lost - entry.lost);
                    entry.lost = lost;
                }
            }
        }
        summaries.push(summary);
    }
    summaries
}
