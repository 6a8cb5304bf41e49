//! SDP exchange handling and the post-ICE renegotiation.
//!
//! Once ICE settles the call re-INVITEs with the selected candidate pair so
//! SIP intermediaries see the addresses media actually flows on. Renegotiation
//! happens at most once per call, and a hangup arriving meanwhile is deferred
//! until the re-INVITE completes.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use webcall_sdp_core::SessionDescription;

use super::controller::CallInner;
use crate::error::{CallError, CallResult, NegotiationError, SignalingError};
use crate::events::{CallEndReason, CallEvent};
use crate::media::MuteFlags;
use crate::negotiation::{CandidatePair, ContentState, content_state, is_audio_only, resolve_candidates};
use crate::signaling::{Originator, SdpDescription};
use crate::transport::{IceConnectionState, IceGatheringState, IceSnapshot, stats_source};

impl CallInner {
    pub(super) async fn on_sdp(self: &Arc<Self>, description: &mut SdpDescription) -> CallResult<()> {
        match description.originator {
            Originator::Remote => debug!(call_id = %self.id, "Receiving SDP {:?}", description.kind),
            Originator::Local => debug!(call_id = %self.id, "Sending SDP {:?}", description.kind),
        }

        let result = match description.originator {
            Originator::Remote => self.apply_remote(description).await,
            Originator::Local => self.apply_local(description),
        };
        result.map_err(|e| self.negotiation_failed(e))
    }

    async fn apply_remote(&self, description: &mut SdpDescription) -> Result<(), NegotiationError> {
        let parsed = SessionDescription::parse(&description.body)?;

        let audio_only = is_audio_only(&parsed);
        let changed = {
            let mut data = self.data.lock();
            let changed = data.audio_only != audio_only;
            data.audio_only = audio_only;
            changed
        };
        if changed {
            info!(call_id = %self.id, "Audio only: {}", audio_only);
            self.notify(CallEvent::AudioOnly(audio_only));
        }

        let state = content_state(&parsed, Originator::Remote, description.kind);

        let restart = {
            let mut data = self.data.lock();
            let needed = data.munger.capabilities().needs_content_restart
                && state == ContentState::Recv
                && description.is_offer();
            match (needed, data.transport.clone()) {
                (true, Some(transport)) => Some((
                    transport,
                    data.munger.content_restart_description(description)?,
                )),
                _ => None,
            }
        };
        if let Some((transport, restart)) = restart {
            debug!(call_id = %self.id, "Restarting PC stream before receiving content");
            match transport.set_remote_description(restart).await {
                Ok(()) => debug!(call_id = %self.id, "Successfully restarted PC stream"),
                Err(e) => error!(call_id = %self.id, "Failed to restart PC stream: {}", e),
            }
        }

        let munged = self.data.lock().munger.munge_remote(description)?;
        self.stats
            .process_description(&munged.canonical, Originator::Remote);
        description.body = munged.description.body;
        self.update_content_state(state);
        Ok(())
    }

    fn apply_local(&self, description: &mut SdpDescription) -> Result<(), NegotiationError> {
        let munged = self.data.lock().munger.munge_local(description)?;
        self.stats.process_description(&munged.canonical, Originator::Local);
        let state = content_state(&munged.canonical, Originator::Local, description.kind);
        description.body = munged.description.body;
        self.update_content_state(state);
        Ok(())
    }

    fn negotiation_failed(&self, e: NegotiationError) -> CallError {
        error!(call_id = %self.id, "Failed to munge SDP: {}", e);
        self.data.lock().set_end_reason(CallEndReason::InternalError);
        self.on_call_error(None);
        e.into()
    }

    fn update_content_state(&self, state: ContentState) {
        {
            let mut data = self.data.lock();
            if data.last_content_state == state {
                return;
            }
            data.last_content_state = state;
        }
        info!(call_id = %self.id, "PC state: {}", state);
        self.notify(CallEvent::PcState(state));
    }

    pub(super) fn on_ice_state(self: &Arc<Self>, snapshot: IceSnapshot) {
        debug!(
            call_id = %self.id,
            "Ice event: gathering={:?} connection={:?} signaling={:?}",
            snapshot.gathering, snapshot.connection, snapshot.signaling
        );

        let mut data = self.data.lock();
        let settled = snapshot.gathering == IceGatheringState::Complete
            && snapshot.connection == data.munger.capabilities().final_ice_state;

        if settled {
            if data.renegotiation_done || data.renegotiation_in_progress || data.call_ending {
                return;
            }
            let Some(transport) = data.transport.clone() else {
                return;
            };
            data.renegotiation_in_progress = true;

            let call = Arc::downgrade(self);
            let retry = self.config.timings.candidate_retry();
            data.timers.candidate_retry = Some(tokio::spawn(async move {
                let pair = resolve_candidates(stats_source(transport).as_ref(), retry).await;
                if let Some(call) = call.upgrade() {
                    call.candidates_resolved(pair);
                }
            }));
        } else if snapshot.connection == IceConnectionState::Failed {
            data.set_end_reason(CallEndReason::IceFailure);
            drop(data);
            error!(call_id = %self.id, "Ice connection state failed - ending the call");
            self.on_call_error(None);
        }
    }

    fn candidates_resolved(self: &Arc<Self>, pair: Option<CandidatePair>) {
        let session = {
            let mut data = self.data.lock();
            // The task calling us owns this handle
            data.timers.candidate_retry.take();
            data.munger.set_candidates(pair);
            match data.session.clone() {
                Some(session) => session,
                None => {
                    data.renegotiation_in_progress = false;
                    return;
                }
            }
        };

        let mute_status = session.is_muted();
        info!(call_id = %self.id, "Renegotiating after ice, mute status = {:?}", mute_status);

        // Not tracked by the call timers: an in-flight re-INVITE must be
        // allowed to finish so a deferred hangup can follow it
        let call = Arc::downgrade(self);
        tokio::spawn(async move {
            let result = session.renegotiate().await;
            if let Some(call) = call.upgrade() {
                call.renegotiation_finished(result, mute_status);
            }
        });
    }

    fn renegotiation_finished(
        self: &Arc<Self>,
        result: Result<(), SignalingError>,
        mute_status: MuteFlags,
    ) {
        if let Err(e) = result {
            warn!(call_id = %self.id, "Renegotiation failed: {}", e);
        }
        let (pending_hangup, call_ending) = {
            let mut data = self.data.lock();
            data.renegotiation_in_progress = false;
            data.renegotiation_done = true;
            (data.pending_hangup, data.call_ending)
        };
        debug!(call_id = %self.id, "Finished renegotiation");
        self.notify(CallEvent::Renegotiated);

        if pending_hangup {
            self.finish_pending_hangup();
        } else if !call_ending {
            self.mute(mute_status.into());
        }
    }

    pub(super) fn on_negotiation_needed(self: &Arc<Self>) {
        let session = {
            let data = self.data.lock();
            if data.call_ending {
                return;
            }
            data.session.clone()
        };
        let Some(session) = session else {
            debug!(call_id = %self.id, "Negotiation needed without a session");
            return;
        };

        let mute_status = session.is_muted();
        self.data.lock().mute_status = mute_status;
        debug!(call_id = %self.id, "Negotiation needed, renegotiating");

        let call = Arc::downgrade(self);
        tokio::spawn(async move {
            let result = session.renegotiate().await;
            let Some(call) = call.upgrade() else {
                return;
            };
            match result {
                Ok(()) => {
                    call.mute(mute_status.into());
                }
                Err(e) => warn!(call_id = %call.id, "Renegotiation failed: {}", e),
            }
        });
    }
}
