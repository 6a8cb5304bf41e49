//! Selected ICE candidate pair lookup.
//!
//! Once ICE settles the local descriptions are rewritten with the addresses
//! actually in use, so the far end can drop every other candidate.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::stats::{CandidatePairStats, CandidateStats, StatsEntry, StatsReport};
use crate::transport::StatsSource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateAddress {
    pub ip: String,
    pub port: u16,
}

impl CandidateAddress {
    fn from_stats(stats: &CandidateStats) -> Option<Self> {
        Some(Self {
            ip: stats.ip()?.to_string(),
            port: stats.port?,
        })
    }
}

/// Addresses of the candidate pair carrying media
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePair {
    pub local: CandidateAddress,
    pub remote: CandidateAddress,
    /// Media runs over TCP
    pub tcp: bool,
}

fn candidate<'a>(report: &'a StatsReport, id: &str) -> Option<&'a CandidateStats> {
    match report.get(id)? {
        StatsEntry::LocalCandidate(c) | StatsEntry::RemoteCandidate(c) => Some(c),
        _ => None,
    }
}

fn pair_from_stats(report: &StatsReport, pair: &CandidatePairStats) -> Option<CandidatePair> {
    let local = candidate(report, &pair.local_candidate_id)?;
    let remote = candidate(report, &pair.remote_candidate_id)?;
    Some(CandidatePair {
        local: CandidateAddress::from_stats(local)?,
        remote: CandidateAddress::from_stats(remote)?,
        tcp: local.is_tcp(),
    })
}

/// Find the selected pair in a report.
///
/// The transport entry names the selected pair. Reports without one fall
/// back to a candidate pair flagged `selected` in the `succeeded` state, in
/// which case TCP is read from the remote candidate.
pub fn selected_candidate_pair(report: &StatsReport) -> Option<CandidatePair> {
    for entry in report.iter() {
        let StatsEntry::Transport(transport) = entry else {
            continue;
        };
        let Some(pair_id) = transport.selected_candidate_pair_id.as_deref() else {
            continue;
        };
        if let Some(StatsEntry::CandidatePair(pair)) = report.get(pair_id) {
            if let Some(found) = pair_from_stats(report, pair) {
                return Some(found);
            }
        }
    }

    report.iter().find_map(|entry| match entry {
        StatsEntry::CandidatePair(pair)
            if pair.selected == Some(true) && pair.state.as_deref() == Some("succeeded") =>
        {
            let mut found = pair_from_stats(report, pair)?;
            found.tcp = candidate(report, &pair.remote_candidate_id).is_some_and(|c| c.is_tcp());
            Some(found)
        }
        _ => None,
    })
}

/// Poll `source` every `retry` until the selected pair is known.
///
/// A stats failure ends the search without a pair, so the caller proceeds
/// with the descriptions unchanged.
pub async fn resolve_candidates(source: &dyn StatsSource, retry: Duration) -> Option<CandidatePair> {
    loop {
        debug!("Parsing stats for ice re-invite info");
        match source.get_stats().await {
            Ok(report) => {
                if let Some(pair) = selected_candidate_pair(&report) {
                    debug!(
                        "Selected candidates local={}:{} remote={}:{} tcp={}",
                        pair.local.ip, pair.local.port, pair.remote.ip, pair.remote.port, pair.tcp
                    );
                    return Some(pair);
                }
                debug!("Stats not present yet, setting timer");
            }
            Err(e) => {
                error!("Failed to get stats to check tcp media: {}", e);
                return None;
            }
        }
        tokio::time::sleep(retry).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::stats::TransportStats;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    fn w3c_report(protocol: &str) -> StatsReport {
        StatsReport::from_json(&format!(
            r#"[
                {{ "type": "transport", "id": "T1", "selectedCandidatePairId": "CP1" }},
                {{ "type": "candidate-pair", "id": "CP1", "localCandidateId": "L1", "remoteCandidateId": "R1" }},
                {{ "type": "local-candidate", "id": "L1", "ip": "10.0.0.2", "port": 50000, "protocol": "{protocol}" }},
                {{ "type": "remote-candidate", "id": "R1", "address": "198.51.100.7", "port": 3478, "protocol": "{protocol}" }}
            ]"#
        ))
        .unwrap()
    }

    #[test]
    fn test_w3c_selected_pair() {
        let pair = selected_candidate_pair(&w3c_report("udp")).unwrap();
        assert_eq!(pair.local, CandidateAddress { ip: "10.0.0.2".into(), port: 50000 });
        assert_eq!(pair.remote, CandidateAddress { ip: "198.51.100.7".into(), port: 3478 });
        assert!(!pair.tcp);

        assert!(selected_candidate_pair(&w3c_report("tcp")).unwrap().tcp);
    }

    #[test]
    fn test_selected_flag_fallback() {
        let report = StatsReport::from_json(
            r#"[
                { "type": "candidate-pair", "id": "CP1", "localCandidateId": "L1", "remoteCandidateId": "R1",
                  "state": "succeeded", "selected": true },
                { "type": "local-candidate", "id": "L1", "ipAddress": "10.0.0.2", "portNumber": 50000 },
                { "type": "remote-candidate", "id": "R1", "ipAddress": "198.51.100.7", "portNumber": 443,
                  "protocol": "TCP" }
            ]"#,
        )
        .unwrap();
        let pair = selected_candidate_pair(&report).unwrap();
        assert!(pair.tcp);
        assert_eq!(pair.remote.port, 443);
    }

    #[test]
    fn test_missing_pair() {
        let mut report = StatsReport::default();
        report.push(StatsEntry::Transport(TransportStats {
            id: "T1".into(),
            selected_candidate_pair_id: Some("CP9".into()),
        }));
        assert_eq!(selected_candidate_pair(&report), None);
    }

    struct Sequence(Mutex<VecDeque<Result<StatsReport, TransportError>>>);

    #[async_trait]
    impl StatsSource for Sequence {
        async fn get_stats(&self) -> Result<StatsReport, TransportError> {
            self.0
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::stats("exhausted")))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_retries_until_present() {
        let source = Sequence(Mutex::new(VecDeque::from(vec![
            Ok(StatsReport::default()),
            Ok(StatsReport::default()),
            Ok(w3c_report("udp")),
        ])));
        let started = tokio::time::Instant::now();

        let pair = resolve_candidates(&source, Duration::from_millis(500)).await;

        assert!(pair.is_some());
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_resolve_gives_up_on_failure() {
        let source = Sequence(Mutex::new(VecDeque::from(vec![Err(TransportError::stats(
            "closed",
        ))])));
        assert_eq!(
            resolve_candidates(&source, Duration::from_millis(500)).await,
            None
        );
    }
}
