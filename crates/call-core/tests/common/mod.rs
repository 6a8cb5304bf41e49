//! Common test helpers for call-core integration tests
//!
//! Provides in-memory stand-ins for the SIP user agent, the signaling session
//! and the peer connection, plus SDP bodies shaped like real browser and
//! conference-bridge descriptions.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use webcall_call_core::stats::StatsReport;
use webcall_call_core::{
    Call, CallConfig, CallEvent, CallEventKind, IceConnectionState, IceGatheringState,
    IceSnapshot, InviteOptions, MediaKinds, MediaStream, MediaTrack, MuteFlags, PeerConnection,
    SdpDescription, SenderId, SignalingAgent, SignalingConnector, SignalingError, SignalingEvent,
    SignalingHandle, SignalingSession, SignalingState, StatsSource, TrackKind, TrackSettings,
    TransportCapabilities, TransportError, UserAgentConfig,
};
use webcall_sdp_core::Direction;

/// Answer from a conference bridge: audio, main video and an inactive
/// content line
pub const REMOTE_ANSWER: &str = "v=0\r\n\
    o=- 1 1 IN IP4 203.0.113.1\r\n\
    s=-\r\n\
    t=0 0\r\n\
    a=group:BUNDLE 0 1 2\r\n\
    m=audio 5000 UDP/TLS/RTP/SAVPF 111\r\n\
    c=IN IP4 203.0.113.1\r\n\
    a=mid:0\r\n\
    a=ice-ufrag:abcd\r\n\
    a=ice-pwd:secretsecretsecret\r\n\
    a=sendrecv\r\n\
    a=rtpmap:111 opus/48000/2\r\n\
    a=ssrc:5001 cname:bridge\r\n\
    m=video 5002 UDP/TLS/RTP/SAVPF 96 100\r\n\
    c=IN IP4 203.0.113.1\r\n\
    b=TIAS:1000000\r\n\
    a=mid:1\r\n\
    a=content:main\r\n\
    a=sendrecv\r\n\
    a=rtpmap:96 VP8/90000\r\n\
    a=rtcp-fb:96 goog-remb\r\n\
    a=rtpmap:100 H264/90000\r\n\
    a=fmtp:100 profile-level-id=42001f\r\n\
    a=ssrc:5002 cname:bridge\r\n\
    m=video 5004 UDP/TLS/RTP/SAVPF 96 100\r\n\
    c=IN IP4 203.0.113.1\r\n\
    b=TIAS:1000000\r\n\
    a=mid:2\r\n\
    a=content:slides\r\n\
    a=inactive\r\n\
    a=rtpmap:96 VP8/90000\r\n\
    a=rtcp-fb:96 goog-remb\r\n\
    a=rtpmap:100 H264/90000\r\n\
    a=fmtp:100 profile-level-id=42001f\r\n\
    a=ssrc:5003 cname:bridge\r\n";

/// Offer from the transport: audio, main video and a content line
pub const LOCAL_OFFER: &str = "v=0\r\n\
    o=- 2 2 IN IP4 127.0.0.1\r\n\
    s=-\r\n\
    t=0 0\r\n\
    a=group:BUNDLE 0 1 2\r\n\
    m=audio 9 RTP/SAVPF 111 126\r\n\
    c=IN IP4 0.0.0.0\r\n\
    a=mid:0\r\n\
    a=sendrecv\r\n\
    a=rtpmap:111 opus/48000/2\r\n\
    a=rtpmap:126 telephone-event/8000\r\n\
    a=ssrc:1111 cname:me\r\n\
    m=video 9 RTP/SAVPF 96 100\r\n\
    c=IN IP4 0.0.0.0\r\n\
    a=mid:1\r\n\
    a=sendrecv\r\n\
    a=rtpmap:96 VP8/90000\r\n\
    a=rtpmap:100 H264/90000\r\n\
    a=fmtp:100 profile-level-id=42e01f\r\n\
    a=ssrc:2222 cname:me\r\n\
    m=video 9 RTP/SAVPF 96 100\r\n\
    c=IN IP4 0.0.0.0\r\n\
    a=mid:2\r\n\
    a=sendrecv\r\n\
    a=rtpmap:96 VP8/90000\r\n\
    a=rtpmap:100 H264/90000\r\n\
    a=fmtp:100 profile-level-id=42e01f\r\n\
    a=ssrc:3333 cname:me\r\n";

/// Selected pair reported once ICE has settled
pub const SELECTED_PAIR_REPORT: &str = r#"[
    { "type": "transport", "id": "T1", "selectedCandidatePairId": "CP1" },
    { "type": "candidate-pair", "id": "CP1", "localCandidateId": "L1", "remoteCandidateId": "R1" },
    { "type": "local-candidate", "id": "L1", "ip": "10.0.0.2", "port": 50000, "protocol": "udp" },
    { "type": "remote-candidate", "id": "R1", "address": "198.51.100.7", "port": 3478, "protocol": "udp" }
]"#;

/// Send call logs to the test output, filtered by `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_config() -> CallConfig {
    CallConfig::new("room@example.com", "example.com", "Ada")
}

#[derive(Debug)]
pub struct MockTrack {
    id: String,
    kind: TrackKind,
    settings: Option<TrackSettings>,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl MockTrack {
    pub fn audio() -> Arc<Self> {
        Self::new("audio-1", TrackKind::Audio, None)
    }

    pub fn video(width: u32, height: u32) -> Arc<Self> {
        Self::new("video-1", TrackKind::Video, Some(TrackSettings::sized(width, height)))
    }

    pub fn new(id: &str, kind: TrackKind, settings: Option<TrackSettings>) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            kind,
            settings,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl MediaTrack for MockTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn settings(&self) -> Option<TrackSettings> {
        self.settings
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Main stream with one audio track and a video track of the given size
pub fn main_stream(width: u32, height: u32) -> MediaStream {
    MediaStream::new(
        "main",
        vec![
            MockTrack::audio() as Arc<dyn MediaTrack>,
            MockTrack::video(width, height) as Arc<dyn MediaTrack>,
        ],
    )
}

pub fn content_stream(width: u32, height: u32) -> (MediaStream, Arc<MockTrack>) {
    let track = MockTrack::video(width, height);
    let stream = MediaStream::new("pc", vec![track.clone() as Arc<dyn MediaTrack>]);
    (stream, track)
}

/// User agent that records what the call asks of it. `stop` reports the
/// websocket closing cleanly, as real user agents do.
#[derive(Default)]
pub struct MockAgent {
    handle: Mutex<Option<SignalingHandle>>,
    pub started: AtomicBool,
    pub stops: AtomicUsize,
    pub invites: Mutex<Vec<String>>,
    pub fail_start: AtomicBool,
}

impl SignalingAgent for MockAgent {
    fn start(&self) -> Result<(), SignalingError> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(SignalingError::connection("refused"));
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<(), SignalingError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        let handle = self.handle.lock().clone();
        if let Some(handle) = handle {
            handle.dispatch(SignalingEvent::Disconnected { code: 1000 });
        }
        Ok(())
    }

    fn invite(&self, target: &str, _options: InviteOptions) -> Result<(), SignalingError> {
        self.invites.lock().push(target.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockConnector {
    pub agent: Arc<MockAgent>,
    pub ua_config: Mutex<Option<UserAgentConfig>>,
    handle: Mutex<Option<SignalingHandle>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn handle(&self) -> SignalingHandle {
        self.handle.lock().clone().expect("call has not dialled")
    }
}

impl SignalingConnector for MockConnector {
    fn connect(
        &self,
        config: &UserAgentConfig,
        handle: SignalingHandle,
    ) -> Result<Arc<dyn SignalingAgent>, SignalingError> {
        *self.ua_config.lock() = Some(config.clone());
        *self.agent.handle.lock() = Some(handle.clone());
        *self.handle.lock() = Some(handle);
        Ok(self.agent.clone())
    }
}

#[derive(Debug, Default)]
pub struct MockSession {
    muted: Mutex<MuteFlags>,
    pub renegotiations: AtomicUsize,
    /// How long a re-INVITE takes to complete
    pub renegotiate_delay: Mutex<Duration>,
}

impl MockSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn renegotiation_count(&self) -> usize {
        self.renegotiations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalingSession for MockSession {
    fn is_muted(&self) -> MuteFlags {
        *self.muted.lock()
    }

    fn mute(&self, kinds: MediaKinds) {
        let mut muted = self.muted.lock();
        muted.audio |= kinds.audio;
        muted.video |= kinds.video;
    }

    fn unmute(&self, kinds: MediaKinds) {
        let mut muted = self.muted.lock();
        muted.audio &= !kinds.audio;
        muted.video &= !kinds.video;
    }

    async fn renegotiate(&self) -> Result<(), SignalingError> {
        self.renegotiations.fetch_add(1, Ordering::SeqCst);
        let delay = *self.renegotiate_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockPeerConnection {
    pub capabilities: Mutex<TransportCapabilities>,
    pub signaling: Mutex<SignalingState>,
    /// `None` makes `get_stats` fail
    pub report: Mutex<Option<StatsReport>>,
    pub stats_requests: AtomicUsize,
    next_sender: AtomicU64,
    pub transceivers: Mutex<Vec<(SenderId, Direction)>>,
    pub added_tracks: Mutex<Vec<SenderId>>,
    pub replaced: Mutex<Vec<SenderId>>,
    pub removed: Mutex<Vec<SenderId>>,
    pub remote_descriptions: Mutex<Vec<SdpDescription>>,
    pub local_streams: Mutex<Vec<MediaStream>>,
}

impl MockPeerConnection {
    pub fn new() -> Arc<Self> {
        Self::with_capabilities(TransportCapabilities::default())
    }

    pub fn with_capabilities(capabilities: TransportCapabilities) -> Arc<Self> {
        Arc::new(Self {
            capabilities: Mutex::new(capabilities),
            signaling: Mutex::new(SignalingState::Stable),
            report: Mutex::new(Some(StatsReport::default())),
            stats_requests: AtomicUsize::new(0),
            next_sender: AtomicU64::new(1),
            transceivers: Mutex::new(Vec::new()),
            added_tracks: Mutex::new(Vec::new()),
            replaced: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
            remote_descriptions: Mutex::new(Vec::new()),
            local_streams: Mutex::new(Vec::new()),
        })
    }

    pub fn set_report(&self, json: &str) {
        *self.report.lock() = Some(StatsReport::from_json(json).expect("valid stats JSON"));
    }

    pub fn set_signaling_state(&self, state: SignalingState) {
        *self.signaling.lock() = state;
    }

    fn next_sender(&self) -> SenderId {
        SenderId(self.next_sender.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl StatsSource for MockPeerConnection {
    async fn get_stats(&self) -> Result<StatsReport, TransportError> {
        self.stats_requests.fetch_add(1, Ordering::SeqCst);
        self.report
            .lock()
            .clone()
            .ok_or_else(|| TransportError::stats("not available"))
    }
}

#[async_trait]
impl PeerConnection for MockPeerConnection {
    fn capabilities(&self) -> TransportCapabilities {
        self.capabilities.lock().clone()
    }

    fn ice_snapshot(&self) -> IceSnapshot {
        IceSnapshot {
            gathering: IceGatheringState::Complete,
            connection: IceConnectionState::Connected,
            signaling: *self.signaling.lock(),
        }
    }

    fn signaling_state(&self) -> SignalingState {
        *self.signaling.lock()
    }

    fn local_streams(&self) -> Vec<MediaStream> {
        self.local_streams.lock().clone()
    }

    fn add_transceiver(
        &self,
        _track: Arc<dyn MediaTrack>,
        direction: Direction,
    ) -> Result<SenderId, TransportError> {
        let sender = self.next_sender();
        self.transceivers.lock().push((sender, direction));
        Ok(sender)
    }

    fn add_track(
        &self,
        _track: Arc<dyn MediaTrack>,
        _stream: &MediaStream,
    ) -> Result<SenderId, TransportError> {
        let sender = self.next_sender();
        self.added_tracks.lock().push(sender);
        Ok(sender)
    }

    fn replace_track(
        &self,
        sender: SenderId,
        _track: Arc<dyn MediaTrack>,
    ) -> Result<(), TransportError> {
        self.replaced.lock().push(sender);
        Ok(())
    }

    fn remove_track(&self, sender: SenderId) -> Result<(), TransportError> {
        self.removed.lock().push(sender);
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: SdpDescription,
    ) -> Result<(), TransportError> {
        self.remote_descriptions.lock().push(description);
        Ok(())
    }
}

/// Collects every event of the registered kinds in delivery order
pub fn record(call: &Call, kinds: &[CallEventKind]) -> Arc<Mutex<Vec<CallEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    for &kind in kinds {
        let sink = events.clone();
        call.on(kind, move |event| sink.lock().push(event));
    }
    events
}

pub fn ice_settled() -> IceSnapshot {
    IceSnapshot {
        gathering: IceGatheringState::Complete,
        connection: IceConnectionState::Completed,
        signaling: SignalingState::Stable,
    }
}

pub fn ice_failed() -> IceSnapshot {
    IceSnapshot {
        gathering: IceGatheringState::Complete,
        connection: IceConnectionState::Failed,
        signaling: SignalingState::Stable,
    }
}

/// A dialled call with its collaborators
pub struct CallHarness {
    pub call: Call,
    pub connector: Arc<MockConnector>,
    pub session: Arc<MockSession>,
    pub transport: Arc<MockPeerConnection>,
}

impl CallHarness {
    pub fn new(config: CallConfig) -> Self {
        Self::with_transport(config, MockPeerConnection::new())
    }

    pub fn with_transport(config: CallConfig, transport: Arc<MockPeerConnection>) -> Self {
        init_tracing();
        let connector = MockConnector::new();
        let call = Call::new(config, connector.clone()).expect("valid config");
        Self {
            call,
            connector,
            session: MockSession::new(),
            transport,
        }
    }

    pub fn handle(&self) -> SignalingHandle {
        self.connector.handle()
    }

    pub fn dial(&self) {
        self.call.dial(main_stream(1280, 720)).expect("dial");
    }

    /// Dial and run the signaling up to the transport being created
    pub fn connect(&self) {
        self.dial();
        let handle = self.handle();
        handle.dispatch(SignalingEvent::Connected);
        handle.dispatch(SignalingEvent::NewSession(self.session.clone()));
        handle.dispatch(SignalingEvent::PeerConnectionCreated(self.transport.clone()));
    }

    /// Connect and have the far end answer
    pub fn answer(&self) {
        self.connect();
        self.handle().dispatch(SignalingEvent::Confirmed);
    }
}

/// Let spawned tasks run to their next await point
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
