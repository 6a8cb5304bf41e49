//! Events raised by a call and the handler registry that delivers them.
//!
//! Handlers are registered per [`CallEventKind`]. One-shot kinds deliver at
//! most one event per registration; the handler is dropped after it runs.
//!
//! ```rust
//! use webcall_call_core::events::{CallEvent, CallEventKind, EventRegistry};
//!
//! let registry = EventRegistry::new();
//! registry.on(CallEventKind::Ringing, |event| println!("{:?}", event));
//!
//! assert!(registry.notify(CallEvent::Ringing));
//! // One-shot: the handler is gone
//! assert!(!registry.notify(CallEvent::Ringing));
//! ```

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::media::MediaStream;
use crate::negotiation::ContentState;

/// Why a call ended. Set at most once; the first writer wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallEndReason {
    UserBye,
    RemoteBye,
    Busy,
    NotFound,
    Rejected,
    ConnectionError,
    ConnectionTimeout,
    ConnectionRefused,
    IceFailure,
    SipError,
    InternalError,
    Unavailable,
}

impl CallEndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallEndReason::UserBye => "user-bye",
            CallEndReason::RemoteBye => "remote-bye",
            CallEndReason::Busy => "busy",
            CallEndReason::NotFound => "not-found",
            CallEndReason::Rejected => "rejected",
            CallEndReason::ConnectionError => "connection-error",
            CallEndReason::ConnectionTimeout => "connection-timeout",
            CallEndReason::ConnectionRefused => "connection-refused",
            CallEndReason::IceFailure => "ice-failure",
            CallEndReason::SipError => "sip-error",
            CallEndReason::InternalError => "internal-error",
            CallEndReason::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for CallEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that happened on a call
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// The signaling connection is up and the INVITE is on its way
    Ringing,
    /// The far end answered
    InCall,
    /// The post-ICE renegotiation finished
    Renegotiated,
    /// Raised on remote descriptions when the audio-only status changes
    AudioOnly(bool),
    AddStream(MediaStream),
    RemoveStream(MediaStream),
    /// Raised when the content channel state changes
    PcState(ContentState),
    Ending,
    Ended(CallEndReason),
}

impl CallEvent {
    pub fn kind(&self) -> CallEventKind {
        match self {
            CallEvent::Ringing => CallEventKind::Ringing,
            CallEvent::InCall => CallEventKind::InCall,
            CallEvent::Renegotiated => CallEventKind::Renegotiated,
            CallEvent::AudioOnly(_) => CallEventKind::AudioOnly,
            CallEvent::AddStream(_) => CallEventKind::AddStream,
            CallEvent::RemoveStream(_) => CallEventKind::RemoveStream,
            CallEvent::PcState(_) => CallEventKind::PcState,
            CallEvent::Ending => CallEventKind::Ending,
            CallEvent::Ended(_) => CallEventKind::Ended,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallEventKind {
    Ringing,
    InCall,
    Renegotiated,
    AudioOnly,
    AddStream,
    RemoveStream,
    PcState,
    Ending,
    Ended,
}

impl CallEventKind {
    /// One-shot kinds drop their handler after the first delivery
    pub fn is_one_shot(&self) -> bool {
        matches!(
            self,
            CallEventKind::Ringing
                | CallEventKind::InCall
                | CallEventKind::Renegotiated
                | CallEventKind::Ending
                | CallEventKind::Ended
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallEventKind::Ringing => "ringing",
            CallEventKind::InCall => "in_call",
            CallEventKind::Renegotiated => "renegotiated",
            CallEventKind::AudioOnly => "audio_only",
            CallEventKind::AddStream => "add_stream",
            CallEventKind::RemoveStream => "remove_stream",
            CallEventKind::PcState => "pc_state",
            CallEventKind::Ending => "ending",
            CallEventKind::Ended => "ended",
        }
    }
}

impl fmt::Display for CallEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type EventHandler = Box<dyn FnMut(CallEvent) + Send>;

/// One handler per event kind
#[derive(Default)]
pub struct EventRegistry {
    handlers: Mutex<HashMap<CallEventKind, EventHandler>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for `kind`, replacing any previous one
    pub fn on<F>(&self, kind: CallEventKind, handler: F)
    where
        F: FnMut(CallEvent) + Send + 'static,
    {
        self.handlers.lock().insert(kind, Box::new(handler));
    }

    /// Deliver `event`. Returns whether a handler ran.
    ///
    /// The handler runs without the registry lock held, so it may register
    /// handlers itself. A handler registered for the same kind while a
    /// repeatable handler runs takes precedence over it.
    pub fn notify(&self, event: CallEvent) -> bool {
        let kind = event.kind();
        let Some(mut handler) = self.handlers.lock().remove(&kind) else {
            trace!("No handler for {} event", kind);
            return false;
        };

        handler(event);

        if !kind.is_one_shot() {
            self.handlers.lock().entry(kind).or_insert(handler);
        }
        true
    }

    pub fn has_handler(&self, kind: CallEventKind) -> bool {
        self.handlers.lock().contains_key(&kind)
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<CallEventKind> = self.handlers.lock().keys().copied().collect();
        f.debug_struct("EventRegistry").field("handlers", &kinds).finish()
    }
}
