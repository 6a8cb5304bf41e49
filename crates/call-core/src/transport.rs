//! Boundary to the real-time transport (the browser-style peer connection).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use webcall_sdp_core::Direction;

use crate::error::TransportError;
use crate::media::{MediaStream, MediaTrack};
use crate::signaling::SdpDescription;
use crate::stats::StatsReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceGatheringState {
    New,
    Gathering,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Failed,
    Disconnected,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    HaveLocalPranswer,
    HaveRemotePranswer,
    Closed,
}

/// ICE and signaling state at the time of a state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IceSnapshot {
    pub gathering: IceGatheringState,
    pub connection: IceConnectionState,
    pub signaling: SignalingState,
}

/// What the transport implementation supports, resolved once per session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportCapabilities {
    /// One m-line per stream. When false the transport speaks the legacy
    /// multi-stream format and descriptions are translated at the boundary.
    pub supports_unified_plan: bool,
    /// ICE connection state that marks connectivity as settled
    pub final_ice_state: IceConnectionState,
    /// Add an `AS` bandwidth line next to each `TIAS` line of remote descriptions
    pub converts_tias_to_as: bool,
    pub allows_h264: bool,
    /// A remote offer that starts receiving content must first disable the
    /// content line on the transport
    pub needs_content_restart: bool,
}

impl Default for TransportCapabilities {
    fn default() -> Self {
        Self {
            supports_unified_plan: true,
            final_ice_state: IceConnectionState::Completed,
            converts_tias_to_as: true,
            allows_h264: true,
            needs_content_restart: false,
        }
    }
}

/// Handle for a sender created on the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SenderId(pub u64);

/// Asynchronous statistics retrieval
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn get_stats(&self) -> Result<StatsReport, TransportError>;
}

/// The peer connection created by the signaling session
#[async_trait]
pub trait PeerConnection: StatsSource + fmt::Debug {
    fn capabilities(&self) -> TransportCapabilities;

    fn ice_snapshot(&self) -> IceSnapshot;

    fn signaling_state(&self) -> SignalingState;

    /// Local streams in the order they were added; index 1 is the content stream
    fn local_streams(&self) -> Vec<MediaStream>;

    fn add_transceiver(
        &self,
        track: Arc<dyn MediaTrack>,
        direction: Direction,
    ) -> Result<SenderId, TransportError>;

    fn add_track(
        &self,
        track: Arc<dyn MediaTrack>,
        stream: &MediaStream,
    ) -> Result<SenderId, TransportError>;

    fn replace_track(
        &self,
        sender: SenderId,
        track: Arc<dyn MediaTrack>,
    ) -> Result<(), TransportError>;

    fn remove_track(&self, sender: SenderId) -> Result<(), TransportError>;

    async fn set_remote_description(
        &self,
        description: SdpDescription,
    ) -> Result<(), TransportError>;
}

/// Callbacks from the transport, forwarded by the signaling layer
#[derive(Debug, Clone)]
pub enum TransportEvent {
    IceStateChanged(IceSnapshot),
    NegotiationNeeded,
    StreamAdded(MediaStream),
    StreamRemoved(MediaStream),
}

struct PeerConnectionStats(Arc<dyn PeerConnection>);

#[async_trait]
impl StatsSource for PeerConnectionStats {
    async fn get_stats(&self) -> Result<StatsReport, TransportError> {
        self.0.get_stats().await
    }
}

/// View a peer connection as a plain stats source
pub fn stats_source(connection: Arc<dyn PeerConnection>) -> Arc<dyn StatsSource> {
    Arc::new(PeerConnectionStats(connection))
}

pub type StatsSuccess = Box<dyn FnOnce(StatsReport) + Send>;
pub type StatsFailure = Box<dyn FnOnce(TransportError) + Send>;

/// Adapts a callback-shaped stats getter to [`StatsSource`].
///
/// The getter receives a success and a failure callback and must call at
/// most one of them, possibly from another thread.
pub struct CallbackStatsSource<F> {
    getter: F,
}

impl<F> CallbackStatsSource<F>
where
    F: Fn(StatsSuccess, StatsFailure) + Send + Sync,
{
    pub fn new(getter: F) -> Self {
        Self { getter }
    }
}

#[async_trait]
impl<F> StatsSource for CallbackStatsSource<F>
where
    F: Fn(StatsSuccess, StatsFailure) + Send + Sync,
{
    async fn get_stats(&self) -> Result<StatsReport, TransportError> {
        let (tx, rx) = oneshot::channel();
        let success_tx = Arc::new(Mutex::new(Some(tx)));
        let failure_tx = success_tx.clone();

        (self.getter)(
            Box::new(move |report| {
                if let Some(tx) = success_tx.lock().take() {
                    let _ = tx.send(Ok(report));
                }
            }),
            Box::new(move |err| {
                if let Some(tx) = failure_tx.lock().take() {
                    let _ = tx.send(Err(err));
                }
            }),
        );

        rx.await
            .map_err(|_| TransportError::stats("stats callback dropped without a result"))?
    }
}
