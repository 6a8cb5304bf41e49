//! Single-call controller for browser-style SIP endpoints.
//!
//! This crate drives one outbound audio/video call over SIP signaling and a
//! peer-connection style transport. It rewrites every offer and answer so
//! both ends accept it, tracks the RTP streams named in the negotiated
//! descriptions for statistics, and manages the optional content
//! (presentation) channel next to the main media.
//!
//! The SIP user agent and the transport are supplied by the embedder through
//! the traits in [`signaling`] and [`transport`].

// Error handling
pub mod error;

// Configuration
pub mod config;

// Local media, events and collaborator boundaries
pub mod events;
pub mod media;
pub mod signaling;
pub mod transport;

// SDP negotiation engine
pub mod negotiation;

// SSRC and statistics tracking
pub mod stats;

// Call session controller
pub mod call;

// Public exports
pub use call::{Call, CallState, ReinviteCompletion, SignalingHandle};
pub use config::{BandwidthPolicy, CallConfig, CallTimings, MediaLimits, VideoSize};
pub use error::{
    CallError, CallResult, NegotiationError, NegotiationResult, SignalingError, TransportError,
};
pub use events::{CallEndReason, CallEvent, CallEventKind};
pub use media::{MediaKinds, MediaStream, MediaTrack, MuteFlags, MuteState, TrackKind, TrackSettings};
pub use negotiation::{ContentState, SdpMunger};
pub use signaling::{
    InviteOptions, Originator, SdpDescription, SdpKind, SessionEndInfo, SignalingAgent,
    SignalingCause, SignalingConnector, SignalingEvent, SignalingSession, UserAgentConfig,
};
pub use stats::{SsrcEntry, StatsReport, StatsTracker, StreamSummary};
pub use transport::{
    IceConnectionState, IceGatheringState, IceSnapshot, PeerConnection, SenderId,
    SignalingState, StatsSource, TransportCapabilities, TransportEvent,
};

/// Re-export of common types
pub mod prelude {
    pub use super::{
        Call, CallConfig, CallEndReason, CallError, CallEvent, CallEventKind, CallResult,
        CallState, ContentState, MediaStream, MuteState, SignalingConnector, SignalingHandle,
    };
}
