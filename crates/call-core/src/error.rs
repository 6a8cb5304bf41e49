//! Error types for the call controller

use thiserror::Error;
use webcall_sdp_core::SdpError;

use crate::signaling::Originator;

/// Result type for call operations
pub type CallResult<T> = Result<T, CallError>;

/// Result type for SDP munging
pub type NegotiationResult<T> = Result<T, NegotiationError>;

/// Failures of the SDP negotiation engine. All of them are fatal to the exchange.
#[derive(Debug, Clone, Error)]
pub enum NegotiationError {
    /// The exchanged body is not valid SDP
    #[error("Failed to parse SDP: {0}")]
    Sdp(#[from] SdpError),

    /// A description was handed to the pass for the other side
    #[error("{actual} SDP passed to the {expected} munging pass")]
    WrongOriginator {
        expected: Originator,
        actual: Originator,
    },

    /// H.264 profile-level-id does not carry the baseline bits
    #[error("H.264 profile '{profile}' is not baseline")]
    ProfileNotBaseline { profile: String },

    /// H.264 profile-level-id is not hexadecimal
    #[error("Malformed H.264 profile-level-id '{profile}'")]
    MalformedProfile { profile: String },
}

/// Errors reported by the signaling collaborator
#[derive(Debug, Clone, Error)]
pub enum SignalingError {
    /// The user agent could not be created or connected
    #[error("Signaling connection error: {message}")]
    Connection { message: String },

    /// An operation on the session failed
    #[error("Signaling session error: {message}")]
    Session { message: String },

    /// The user agent has already been stopped
    #[error("Signaling user agent is stopped")]
    Stopped,
}

impl SignalingError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }
}

/// Errors reported by the transport collaborator
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Statistics could not be retrieved
    #[error("Failed to get stats: {message}")]
    Stats { message: String },

    /// A track or description operation failed
    #[error("Transport operation '{operation}' failed: {message}")]
    Operation { operation: String, message: String },

    /// The peer connection is closed
    #[error("Transport is closed")]
    Closed,
}

impl TransportError {
    pub fn stats(message: impl Into<String>) -> Self {
        Self::Stats {
            message: message.into(),
        }
    }

    pub fn operation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Errors returned by the public call API
#[derive(Debug, Clone, Error)]
pub enum CallError {
    /// Caller input rejected before anything was started
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// The operation is not allowed in the current call state
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    #[error("Negotiation error: {0}")]
    Negotiation(#[from] NegotiationError),

    #[error("Signaling error: {0}")]
    Signaling(#[from] SignalingError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl CallError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Check if the error is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, CallError::Validation { .. })
    }
}

impl From<SdpError> for CallError {
    fn from(err: SdpError) -> Self {
        CallError::Negotiation(NegotiationError::Sdp(err))
    }
}
