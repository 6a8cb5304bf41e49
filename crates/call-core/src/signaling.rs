//! Boundary to the SIP user agent.
//!
//! The call never speaks SIP itself. A [`SignalingConnector`] creates the user
//! agent, which reports back through the [`SignalingHandle`] it was given:
//! lifecycle events through `dispatch`, offers and answers through
//! `sdp_exchanged` (which rewrites the body in place before it is applied or
//! sent) and transport callbacks through `transport_event`.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::CallConfig;
use crate::error::SignalingError;
use crate::media::{MediaKinds, MediaStream, MuteFlags};
use crate::transport::PeerConnection;

pub use crate::call::{ReinviteCompletion, SignalingHandle};

/// Which side produced a description or ended a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Originator {
    Local,
    Remote,
}

impl fmt::Display for Originator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Originator::Local => f.write_str("local"),
            Originator::Remote => f.write_str("remote"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// One SDP exchange. The body is replaced by the munged text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdpDescription {
    pub originator: Originator,
    pub kind: SdpKind,
    pub body: String,
}

impl SdpDescription {
    pub fn new(originator: Originator, kind: SdpKind, body: impl Into<String>) -> Self {
        Self {
            originator,
            kind,
            body: body.into(),
        }
    }

    pub fn local_offer(body: impl Into<String>) -> Self {
        Self::new(Originator::Local, SdpKind::Offer, body)
    }

    pub fn local_answer(body: impl Into<String>) -> Self {
        Self::new(Originator::Local, SdpKind::Answer, body)
    }

    pub fn remote_offer(body: impl Into<String>) -> Self {
        Self::new(Originator::Remote, SdpKind::Offer, body)
    }

    pub fn remote_answer(body: impl Into<String>) -> Self {
        Self::new(Originator::Remote, SdpKind::Answer, body)
    }

    pub fn is_offer(&self) -> bool {
        self.kind == SdpKind::Offer
    }
}

/// Why the user agent ended a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingCause {
    Canceled,
    ConnectionError,
    Bye,
    NotFound,
    RequestTimeout,
    Rejected,
    Busy,
    SipFailureCode,
    Unavailable,
    Other(String),
}

impl SignalingCause {
    /// Map a cause name as reported by common SIP user agents
    pub fn from_name(name: &str) -> Self {
        match name {
            "Canceled" => SignalingCause::Canceled,
            "Connection Error" => SignalingCause::ConnectionError,
            "Bye" | "BYE" => SignalingCause::Bye,
            "Not Found" => SignalingCause::NotFound,
            "Request Timeout" => SignalingCause::RequestTimeout,
            "Rejected" => SignalingCause::Rejected,
            "Busy" => SignalingCause::Busy,
            "SIP Failure Code" => SignalingCause::SipFailureCode,
            "Unavailable" => SignalingCause::Unavailable,
            other => SignalingCause::Other(other.to_string()),
        }
    }
}

/// Payload of session `ended` and `failed` events
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionEndInfo {
    pub originator: Option<Originator>,
    pub cause: Option<SignalingCause>,
}

impl SessionEndInfo {
    pub fn new(originator: Originator, cause: SignalingCause) -> Self {
        Self {
            originator: Some(originator),
            cause: Some(cause),
        }
    }
}

/// Settings for the user agent created by `dial`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAgentConfig {
    pub uri: String,
    pub ws_url: String,
    pub display_name: String,
    pub register: bool,
    pub session_timers: bool,
}

impl UserAgentConfig {
    pub fn from_call_config(config: &CallConfig) -> Self {
        Self {
            uri: format!("unknown@{}", config.domain),
            ws_url: format!("wss://{}:{}", config.domain, config.websocket_port),
            display_name: config.display_name.clone(),
            register: false,
            session_timers: false,
        }
    }
}

/// Options for the outbound INVITE
#[derive(Debug, Clone)]
pub struct InviteOptions {
    pub offer_to_receive_audio: bool,
    pub offer_to_receive_video: bool,
    pub media_stream: MediaStream,
}

/// Events raised by the user agent and its session
#[derive(Debug, Clone)]
pub enum SignalingEvent {
    /// The websocket to the signaling server is up
    Connected,
    /// The websocket closed; 1000 is a clean close
    Disconnected { code: u16 },
    NewSession(Arc<dyn SignalingSession>),
    Ended(SessionEndInfo),
    Failed(SessionEndInfo),
    Confirmed,
    PeerConnectionCreated(Arc<dyn PeerConnection>),
}

/// Creates the user agent for a call
pub trait SignalingConnector: Send + Sync {
    fn connect(
        &self,
        config: &UserAgentConfig,
        handle: SignalingHandle,
    ) -> Result<Arc<dyn SignalingAgent>, SignalingError>;
}

/// A SIP user agent bound to one call.
///
/// After `stop` the agent must eventually dispatch
/// [`SignalingEvent::Disconnected`].
pub trait SignalingAgent: Send + Sync {
    fn start(&self) -> Result<(), SignalingError>;

    fn stop(&self) -> Result<(), SignalingError>;

    fn invite(&self, target: &str, options: InviteOptions) -> Result<(), SignalingError>;
}

/// The INVITE dialog created by the user agent
#[async_trait]
pub trait SignalingSession: Send + Sync + fmt::Debug {
    fn is_muted(&self) -> MuteFlags;

    fn mute(&self, kinds: MediaKinds);

    fn unmute(&self, kinds: MediaKinds);

    /// Send a re-INVITE and wait for it to complete
    async fn renegotiate(&self) -> Result<(), SignalingError>;
}
