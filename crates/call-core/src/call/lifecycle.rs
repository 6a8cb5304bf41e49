//! Dial, hangup and the single teardown path every failure goes through.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::controller::{CallInner, CallState, SignalingHandle};
use crate::error::{CallError, CallResult};
use crate::events::{CallEndReason, CallEvent};
use crate::media::{MediaKinds, MediaStream};
use crate::signaling::{Originator, SessionEndInfo, SignalingCause, UserAgentConfig};

/// Websocket close code of a clean shutdown
const NORMAL_CLOSURE: u16 = 1000;

/// Map the cause reported by the user agent to an end reason
pub(super) fn translate_cause(info: &SessionEndInfo) -> CallEndReason {
    let (Some(originator), Some(cause)) = (info.originator, info.cause.as_ref()) else {
        error!("Unknown error in call");
        return CallEndReason::InternalError;
    };
    match cause {
        SignalingCause::Canceled => CallEndReason::InternalError,
        SignalingCause::ConnectionError => CallEndReason::ConnectionError,
        SignalingCause::Bye => match originator {
            Originator::Remote => CallEndReason::RemoteBye,
            Originator::Local => CallEndReason::UserBye,
        },
        SignalingCause::NotFound => CallEndReason::NotFound,
        SignalingCause::RequestTimeout => CallEndReason::SipError,
        SignalingCause::Rejected => CallEndReason::Rejected,
        SignalingCause::Busy => CallEndReason::Busy,
        SignalingCause::SipFailureCode => CallEndReason::SipError,
        SignalingCause::Unavailable => CallEndReason::Unavailable,
        SignalingCause::Other(_) => CallEndReason::InternalError,
    }
}

impl CallInner {
    pub(super) fn dial(self: &Arc<Self>, stream: MediaStream) -> CallResult<()> {
        stream.validate_main(self.config.media.main_video)?;
        {
            let mut data = self.data.lock();
            if data.state != CallState::Idle {
                return Err(CallError::invalid_state(format!(
                    "Cannot dial a call in state {}",
                    data.state
                )));
            }
            data.state = CallState::Dialing;
        }

        info!(call_id = %self.id, "Dialling: {}", self.config.target);
        let ua_config = UserAgentConfig::from_call_config(&self.config);
        let agent = match self.connector.connect(&ua_config, SignalingHandle::new(self)) {
            Ok(agent) => agent,
            Err(e) => {
                self.data.lock().state = CallState::Idle;
                return Err(e.into());
            }
        };

        {
            let mut data = self.data.lock();
            data.end_reason = None;
            data.call_ending = false;
            data.agent = Some(agent.clone());
            data.munger.set_local_media(stream.presence());
            data.local_stream = Some(stream);
            data.timers.connection_timeout = Some(self.spawn_connection_timeout());
        }

        if let Err(e) = agent.start() {
            warn!(call_id = %self.id, "Failed to start user agent: {}", e);
            let mut data = self.data.lock();
            data.timers.cancel_all();
            data.agent = None;
            data.local_stream = None;
            data.state = CallState::Idle;
            return Err(e.into());
        }
        Ok(())
    }

    fn spawn_connection_timeout(self: &Arc<Self>) -> JoinHandle<()> {
        let call = Arc::downgrade(self);
        let timeout = self.config.timings.connection_timeout();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(call) = call.upgrade() {
                call.connection_timed_out();
            }
        })
    }

    fn connection_timed_out(self: &Arc<Self>) {
        {
            let mut data = self.data.lock();
            data.timers.connection_timeout.take();
            data.set_end_reason(CallEndReason::ConnectionTimeout);
        }
        warn!(call_id = %self.id, "WS connection timed out trying to connect");
        self.on_call_error(None);
    }

    /// Stop everything that runs on its own: timers, stats, and the mute
    /// state held by the session
    pub(super) fn shutdown(&self) {
        let session = {
            let mut data = self.data.lock();
            data.timers.cancel_all();
            data.session.clone()
        };
        self.stats.stop();
        if let Some(session) = session {
            session.unmute(MediaKinds::ALL);
        }
    }

    pub(super) fn hangup(self: &Arc<Self>) {
        {
            let data = self.data.lock();
            if matches!(data.state, CallState::Idle | CallState::Ended) {
                debug!(call_id = %self.id, "Hangup with no call in progress");
                return;
            }
            // The grace timer armed by the first hangup stays in charge
            if data.pending_hangup {
                debug!(call_id = %self.id, "Hangup already pending");
                return;
            }
        }

        self.shutdown();
        debug!(call_id = %self.id, "Hangup");
        self.notify_ending();

        let agent = {
            let mut data = self.data.lock();
            if data.renegotiation_in_progress {
                // A BYE may not be sent while the re-INVITE is pending
                if !data.pending_hangup {
                    debug!(call_id = %self.id, "Renegotiation in progress, deferring hangup");
                    data.pending_hangup = true;
                    data.timers.hangup_grace = Some(self.spawn_hangup_grace());
                }
                return;
            }
            data.pending_hangup = false;
            if data.call_ending {
                return;
            }
            data.set_end_reason(CallEndReason::UserBye);
            data.call_ending = true;
            data.agent.clone()
        };

        if let Some(agent) = agent {
            if let Err(e) = agent.stop() {
                warn!(call_id = %self.id, "Error stopping user agent after user hangup: {}", e);
            }
        }
    }

    fn spawn_hangup_grace(self: &Arc<Self>) -> JoinHandle<()> {
        let call = Arc::downgrade(self);
        let grace = self.config.timings.hangup_grace();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(call) = call.upgrade() {
                call.data.lock().timers.hangup_grace.take();
                debug!(call_id = %call.id, "Renegotiation did not finish in time");
                call.finish_pending_hangup();
            }
        })
    }

    /// Carry out a hangup deferred by an in-flight renegotiation
    pub(super) fn finish_pending_hangup(self: &Arc<Self>) {
        {
            let mut data = self.data.lock();
            if !data.pending_hangup {
                return;
            }
            data.pending_hangup = false;
            data.renegotiation_in_progress = false;
            if let Some(timer) = data.timers.hangup_grace.take() {
                timer.abort();
            }
        }
        self.hangup();
    }

    /// The session ended or failed, or a local failure ends the call
    pub(super) fn on_call_error(&self, end: Option<SessionEndInfo>) {
        self.shutdown();
        debug!(call_id = %self.id, "RTC session has ended");
        if let Some(end) = &end {
            debug!(call_id = %self.id, "Due to {:?}", end);
        }
        self.notify_ending();

        let agent = {
            let mut data = self.data.lock();
            if data.call_ending {
                None
            } else {
                data.call_ending = true;
                if let Some(end) = &end {
                    if data.end_reason.is_none() {
                        data.end_reason = Some(translate_cause(end));
                    }
                }
                data.agent.clone()
            }
        };

        if let Some(agent) = agent {
            if let Err(e) = agent.stop() {
                warn!(
                    call_id = %self.id,
                    "Error stopping user agent after session ended: {}", e
                );
            }
        }
    }

    /// The signaling websocket closed
    pub(super) fn on_disconnected(&self, code: u16) {
        self.shutdown();

        let agent = {
            let mut data = self.data.lock();
            if code != NORMAL_CLOSURE && !data.call_ending {
                data.call_ending = true;
                data.agent.clone()
            } else {
                None
            }
        };
        self.notify_ending();
        if let Some(agent) = agent {
            warn!(call_id = %self.id, "Websocket closed with code {} - ending call", code);
            if let Err(e) = agent.stop() {
                warn!(call_id = %self.id, "Error stopping user agent after disconnect: {}", e);
            }
        }

        let reason = {
            let mut data = self.data.lock();
            let reason = match data.end_reason {
                Some(reason) => reason,
                None => {
                    let reason = if data.connected_ws {
                        error!(call_id = %self.id, "WS connection unexpected error");
                        CallEndReason::ConnectionError
                    } else {
                        error!(call_id = %self.id, "WS connection refused");
                        CallEndReason::ConnectionRefused
                    };
                    data.end_reason = Some(reason);
                    reason
                }
            };
            if data.ended_notified {
                return;
            }
            data.ended_notified = true;
            data.state = CallState::Ended;
            reason
        };

        info!(call_id = %self.id, "Call ended: {}", reason);
        self.notify(CallEvent::Ended(reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cause_table() {
        let remote = |cause| translate_cause(&SessionEndInfo::new(Originator::Remote, cause));

        assert_eq!(remote(SignalingCause::Bye), CallEndReason::RemoteBye);
        assert_eq!(
            translate_cause(&SessionEndInfo::new(Originator::Local, SignalingCause::Bye)),
            CallEndReason::UserBye
        );
        assert_eq!(remote(SignalingCause::Canceled), CallEndReason::InternalError);
        assert_eq!(remote(SignalingCause::RequestTimeout), CallEndReason::SipError);
        assert_eq!(remote(SignalingCause::SipFailureCode), CallEndReason::SipError);
        assert_eq!(remote(SignalingCause::Busy), CallEndReason::Busy);
        assert_eq!(remote(SignalingCause::NotFound), CallEndReason::NotFound);
        assert_eq!(remote(SignalingCause::Rejected), CallEndReason::Rejected);
        assert_eq!(remote(SignalingCause::Unavailable), CallEndReason::Unavailable);
        assert_eq!(
            remote(SignalingCause::ConnectionError),
            CallEndReason::ConnectionError
        );
        assert_eq!(
            remote(SignalingCause::Other("Address Incomplete".into())),
            CallEndReason::InternalError
        );
    }

    #[test]
    fn test_missing_cause_is_internal_error() {
        assert_eq!(
            translate_cause(&SessionEndInfo::default()),
            CallEndReason::InternalError
        );
    }
}
