use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::CallConfig;
use crate::error::{CallError, CallResult};
use crate::events::{CallEndReason, CallEvent, CallEventKind, EventRegistry};
use crate::media::{MediaKinds, MediaStream, MuteFlags, MuteState};
use crate::negotiation::{ContentState, SdpMunger};
use crate::signaling::{
    InviteOptions, SdpDescription, SignalingAgent, SignalingConnector, SignalingEvent,
    SignalingSession,
};
use crate::stats::{SsrcEntry, StatsTracker};
use crate::transport::{
    PeerConnection, SenderId, TransportCapabilities, TransportEvent, stats_source,
};

/// Lifecycle state of a call. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    /// Created, `dial` not called yet
    Idle,
    /// User agent started, waiting for the signaling connection
    Dialing,
    /// INVITE sent
    Ringing,
    /// The transport for the session exists
    Connected,
    /// The far end answered
    InCall,
    Ending,
    Ended,
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallState::Idle => "idle",
            CallState::Dialing => "dialing",
            CallState::Ringing => "ringing",
            CallState::Connected => "connected",
            CallState::InCall => "in_call",
            CallState::Ending => "ending",
            CallState::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// Timers owned by a call. Each task holds only a weak reference to it.
#[derive(Default)]
pub(super) struct CallTimers {
    pub connection_timeout: Option<JoinHandle<()>>,
    pub hangup_grace: Option<JoinHandle<()>>,
    pub content_retry: Option<JoinHandle<()>>,
    pub candidate_retry: Option<JoinHandle<()>>,
}

impl CallTimers {
    pub fn cancel_all(&mut self) {
        for timer in [
            &mut self.connection_timeout,
            &mut self.hangup_grace,
            &mut self.content_retry,
            &mut self.candidate_retry,
        ] {
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for CallTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Mutable state of a call, always accessed under one lock
pub(super) struct CallData {
    pub state: CallState,
    pub end_reason: Option<CallEndReason>,
    pub agent: Option<Arc<dyn SignalingAgent>>,
    pub session: Option<Arc<dyn SignalingSession>>,
    pub transport: Option<Arc<dyn PeerConnection>>,
    pub munger: SdpMunger,
    pub local_stream: Option<MediaStream>,
    /// Mute status to restore after renegotiations and on confirm
    pub mute_status: MuteFlags,
    /// The signaling websocket connected at least once
    pub connected_ws: bool,
    /// The user agent has been told to stop
    pub call_ending: bool,
    pub ending_notified: bool,
    pub ended_notified: bool,
    pub renegotiation_in_progress: bool,
    pub renegotiation_done: bool,
    pub pending_hangup: bool,
    pub audio_only: bool,
    pub last_content_state: ContentState,
    pub content_stream: Option<MediaStream>,
    pub content_senders: Vec<SenderId>,
    pub timers: CallTimers,
}

impl CallData {
    fn new(munger: SdpMunger) -> Self {
        Self {
            state: CallState::Idle,
            end_reason: None,
            agent: None,
            session: None,
            transport: None,
            munger,
            local_stream: None,
            mute_status: MuteFlags::default(),
            connected_ws: false,
            call_ending: false,
            ending_notified: false,
            ended_notified: false,
            renegotiation_in_progress: false,
            renegotiation_done: false,
            pending_hangup: false,
            audio_only: false,
            last_content_state: ContentState::Disabled,
            content_stream: None,
            content_senders: Vec::new(),
            timers: CallTimers::default(),
        }
    }

    /// Move forward to `state`; earlier states are ignored
    pub fn advance(&mut self, state: CallState) {
        if state > self.state {
            self.state = state;
        }
    }

    /// Record why the call ends unless a reason is already set
    pub fn set_end_reason(&mut self, reason: CallEndReason) {
        if self.end_reason.is_none() {
            self.end_reason = Some(reason);
        }
    }
}

pub(super) struct CallInner {
    pub id: Uuid,
    pub config: CallConfig,
    pub connector: Arc<dyn SignalingConnector>,
    pub events: EventRegistry,
    pub stats: StatsTracker,
    pub data: Mutex<CallData>,
}

/// A single outbound call.
///
/// `Call` is a cheap handle; clones refer to the same call. Timers are
/// Tokio tasks, so `dial` and the signaling callbacks must run inside a
/// Tokio runtime.
#[derive(Clone)]
pub struct Call {
    inner: Arc<CallInner>,
}

impl Call {
    /// Create a call. Fails if the configuration is invalid.
    pub fn new(config: CallConfig, connector: Arc<dyn SignalingConnector>) -> CallResult<Self> {
        let config = config.validate()?;
        let munger = SdpMunger::new(&config, &TransportCapabilities::default());
        let inner = Arc::new(CallInner {
            id: Uuid::new_v4(),
            stats: StatsTracker::new(config.timings.stats_period()),
            config,
            connector,
            events: EventRegistry::new(),
            data: Mutex::new(CallData::new(munger)),
        });
        debug!(call_id = %inner.id, "Created call to {}", inner.config.target);
        Ok(Self { inner })
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn config(&self) -> &CallConfig {
        &self.inner.config
    }

    pub fn state(&self) -> CallState {
        self.inner.data.lock().state
    }

    /// Set once the call starts ending
    pub fn end_reason(&self) -> Option<CallEndReason> {
        self.inner.data.lock().end_reason
    }

    /// Last content channel state notified
    pub fn content_state(&self) -> ContentState {
        self.inner.data.lock().last_content_state
    }

    pub fn is_audio_only(&self) -> bool {
        self.inner.data.lock().audio_only
    }

    /// Register the handler for one kind of event, replacing any earlier one
    pub fn on<F>(&self, kind: CallEventKind, handler: F)
    where
        F: FnMut(CallEvent) + Send + 'static,
    {
        self.inner.events.on(kind, handler);
    }

    /// Start the call with the main local stream: exactly one audio track
    /// and at most one video track within the main video limits.
    pub fn dial(&self, stream: MediaStream) -> CallResult<()> {
        self.inner.dial(stream)
    }

    pub fn hangup(&self) {
        self.inner.hangup();
    }

    /// Apply a mute change. Returns false when there is no session yet.
    pub fn mute(&self, state: MuteState) -> bool {
        self.inner.mute(state)
    }

    pub fn is_muted(&self) -> MuteFlags {
        let session = self.inner.data.lock().session.clone();
        session.map(|s| s.is_muted()).unwrap_or_default()
    }

    /// Start sending a content (presentation) stream: no audio and at most
    /// one video track within the content video limits.
    pub fn add_pc_stream(&self, stream: MediaStream) -> CallResult<()> {
        self.inner.add_pc_stream(stream)
    }

    pub fn remove_pc_stream(&self, stream: &MediaStream) {
        self.inner.remove_pc_stream(stream);
    }

    /// Streams currently tracked for statistics
    pub fn ssrc_entries(&self) -> Vec<SsrcEntry> {
        self.inner.stats.entries()
    }
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

impl CallInner {
    pub(super) fn notify(&self, event: CallEvent) {
        self.events.notify(event);
    }

    /// Raise `ending` once per call
    pub(super) fn notify_ending(&self) {
        {
            let mut data = self.data.lock();
            if data.ending_notified {
                return;
            }
            data.ending_notified = true;
            data.advance(CallState::Ending);
        }
        self.notify(CallEvent::Ending);
    }

    fn handle_signaling(self: &Arc<Self>, event: SignalingEvent) {
        match event {
            SignalingEvent::Connected => self.on_ws_connected(),
            SignalingEvent::Disconnected { code } => self.on_disconnected(code),
            SignalingEvent::NewSession(session) => self.on_new_session(session),
            SignalingEvent::Ended(end) => {
                debug!(call_id = %self.id, "RTC session ended");
                self.on_call_error(Some(end));
            }
            SignalingEvent::Failed(end) => {
                warn!(call_id = %self.id, "RTC session failure");
                self.on_call_error(Some(end));
            }
            SignalingEvent::Confirmed => self.on_confirmed(),
            SignalingEvent::PeerConnectionCreated(connection) => {
                self.on_peer_connection(connection)
            }
        }
    }

    fn on_ws_connected(self: &Arc<Self>) {
        let (agent, stream) = {
            let mut data = self.data.lock();
            data.connected_ws = true;
            if let Some(timer) = data.timers.connection_timeout.take() {
                timer.abort();
            }
            if data.call_ending {
                return;
            }
            data.advance(CallState::Ringing);
            (data.agent.clone(), data.local_stream.clone())
        };
        info!(call_id = %self.id, "User agent connected");
        self.notify(CallEvent::Ringing);

        let (Some(agent), Some(stream)) = (agent, stream) else {
            warn!(call_id = %self.id, "Signaling connected without a user agent or local stream");
            return;
        };
        let options = InviteOptions {
            offer_to_receive_audio: true,
            offer_to_receive_video: true,
            media_stream: stream,
        };
        let target = format!("sip:{}", self.config.target);
        info!(call_id = %self.id, "Sending sip invite to {}", target);
        if let Err(e) = agent.invite(&target, options) {
            warn!(call_id = %self.id, "Failed to send invite: {}", e);
            self.data.lock().set_end_reason(CallEndReason::InternalError);
            self.on_call_error(None);
        }
    }

    fn on_new_session(&self, session: Arc<dyn SignalingSession>) {
        let mute_status = session.is_muted();
        info!(call_id = %self.id, "Initial mute status = {:?}", mute_status);
        let mut data = self.data.lock();
        data.session = Some(session);
        data.mute_status = mute_status;
    }

    fn on_confirmed(&self) {
        let mute_status = {
            let mut data = self.data.lock();
            data.advance(CallState::InCall);
            data.mute_status
        };
        debug!(call_id = %self.id, "Call confirmed - going to in_call state");
        self.mute(mute_status.into());
        self.notify(CallEvent::InCall);
    }

    fn on_peer_connection(&self, connection: Arc<dyn PeerConnection>) {
        let capabilities = connection.capabilities();
        {
            let mut data = self.data.lock();
            data.munger.set_capabilities(capabilities);
            data.transport = Some(connection.clone());
            data.advance(CallState::Connected);
        }
        info!(call_id = %self.id, "RTC session peer connection created");
        self.stats.start(stats_source(connection));
    }

    pub(super) fn mute(&self, state: MuteState) -> bool {
        let (session, transport) = {
            let data = self.data.lock();
            (data.session.clone(), data.transport.clone())
        };
        let Some(session) = session else {
            return false;
        };

        if let Some(audio) = state.audio {
            if audio {
                info!(call_id = %self.id, "Muting audio");
                session.mute(MediaKinds::AUDIO);
            } else {
                info!(call_id = %self.id, "Unmuting audio");
                session.unmute(MediaKinds::AUDIO);
            }
        }
        if let Some(video) = state.video {
            if video {
                info!(call_id = %self.id, "Muting video");
                session.mute(MediaKinds::VIDEO);
            } else {
                info!(call_id = %self.id, "Unmuting video");
                session.unmute(MediaKinds::VIDEO);
            }
        }

        // The content stream is never muted
        if let Some(content) = transport.and_then(|t| t.local_streams().into_iter().nth(1)) {
            for track in content.video_tracks() {
                track.set_enabled(true);
            }
        }

        let status = session.is_muted();
        self.data.lock().mute_status = status;
        true
    }
}

/// The call's end of the signaling boundary.
///
/// Holds a weak reference; events arriving after the call is dropped are
/// ignored.
#[derive(Debug, Clone)]
pub struct SignalingHandle {
    call: Weak<CallInner>,
}

impl SignalingHandle {
    pub(super) fn new(call: &Arc<CallInner>) -> Self {
        Self {
            call: Arc::downgrade(call),
        }
    }

    fn upgrade(&self) -> Option<Arc<CallInner>> {
        let call = self.call.upgrade();
        if call.is_none() {
            debug!("Signaling callback for a dropped call");
        }
        call
    }

    pub fn dispatch(&self, event: SignalingEvent) {
        if let Some(call) = self.upgrade() {
            call.handle_signaling(event);
        }
    }

    /// Rewrite an offer or answer in place before it is applied or sent.
    ///
    /// A description that cannot be negotiated ends the call with an
    /// internal error and is returned as an error.
    pub async fn sdp_exchanged(&self, description: &mut SdpDescription) -> CallResult<()> {
        let call = self
            .upgrade()
            .ok_or_else(|| CallError::invalid_state("Call has been dropped"))?;
        call.on_sdp(description).await
    }

    /// The far end sent a re-INVITE. Complete the returned value once it
    /// has been answered to restore the mute status.
    pub fn reinvite_requested(&self) -> ReinviteCompletion {
        let call = self.upgrade();
        let mute_status = call
            .as_ref()
            .and_then(|call| call.data.lock().session.clone())
            .map(|session| session.is_muted())
            .unwrap_or_default();
        if let Some(call) = &call {
            info!(call_id = %call.id, "Reinvite");
            call.data.lock().mute_status = mute_status;
        }
        ReinviteCompletion {
            call: self.call.clone(),
            mute_status,
        }
    }

    pub fn transport_event(&self, event: TransportEvent) {
        let Some(call) = self.upgrade() else {
            return;
        };
        match event {
            TransportEvent::IceStateChanged(snapshot) => call.on_ice_state(snapshot),
            TransportEvent::NegotiationNeeded => call.on_negotiation_needed(),
            TransportEvent::StreamAdded(stream) => call.notify(CallEvent::AddStream(stream)),
            TransportEvent::StreamRemoved(stream) => call.notify(CallEvent::RemoveStream(stream)),
        }
    }
}

/// Pending end of a remote re-INVITE
#[must_use = "complete the re-INVITE to restore the mute status"]
#[derive(Debug)]
pub struct ReinviteCompletion {
    call: Weak<CallInner>,
    mute_status: MuteFlags,
}

impl ReinviteCompletion {
    pub fn mute_status(&self) -> MuteFlags {
        self.mute_status
    }

    pub fn complete(self) {
        if let Some(call) = self.call.upgrade() {
            info!(call_id = %call.id, "Reinvite finished");
            call.mute(self.mute_status.into());
        }
    }
}
