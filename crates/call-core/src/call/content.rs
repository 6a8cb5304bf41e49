//! The content (presentation) stream sent next to the main call media.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use webcall_sdp_core::Direction;

use super::controller::CallInner;
use crate::error::CallResult;
use crate::media::MediaStream;
use crate::transport::SignalingState;

impl CallInner {
    pub(super) fn add_pc_stream(self: &Arc<Self>, stream: MediaStream) -> CallResult<()> {
        stream.validate_content(self.config.media.content_video)?;
        info!(call_id = %self.id, "Adding PC stream {}", stream.id());
        self.data.lock().content_stream = Some(stream);
        self.try_add_content();
        Ok(())
    }

    /// Attach the pending content stream to the transport, or retry later
    /// while a renegotiation is running
    fn try_add_content(self: &Arc<Self>) {
        let (stream, session, transport, renegotiating, existing) = {
            let data = self.data.lock();
            (
                data.content_stream.clone(),
                data.session.clone(),
                data.transport.clone(),
                data.renegotiation_in_progress,
                data.content_senders.clone(),
            )
        };
        let Some(stream) = stream else {
            return;
        };
        let (Some(_), Some(transport)) = (session, transport) else {
            warn!(call_id = %self.id, "No session to add the PC stream to");
            self.data.lock().content_stream = None;
            return;
        };

        let signaling = transport.signaling_state();
        if signaling == SignalingState::Closed {
            debug!(call_id = %self.id, "Transport closed, dropping PC stream");
            return;
        }
        if renegotiating || signaling != SignalingState::Stable {
            debug!(
                call_id = %self.id,
                "Negotiation in progress ({:?}), retrying PC stream later", signaling
            );
            let timer = self.spawn_content_retry();
            if let Some(previous) = self.data.lock().timers.content_retry.replace(timer) {
                previous.abort();
            }
            return;
        }

        let unified = transport.capabilities().supports_unified_plan;
        let mut senders = Vec::with_capacity(stream.tracks().len());
        for (i, track) in stream.tracks().iter().enumerate() {
            let result = match existing.get(i) {
                Some(&sender) => transport
                    .replace_track(sender, track.clone())
                    .map(|()| sender),
                None if unified => transport.add_transceiver(track.clone(), Direction::SendOnly),
                None => transport.add_track(track.clone(), &stream),
            };
            match result {
                Ok(sender) => senders.push(sender),
                Err(e) => error!(call_id = %self.id, "Failed to add PC track {}: {}", track.id(), e),
            }
        }
        debug!(call_id = %self.id, "PC stream attached with {} senders", senders.len());
        self.data.lock().content_senders = senders;
    }

    fn spawn_content_retry(self: &Arc<Self>) -> JoinHandle<()> {
        let call = Arc::downgrade(self);
        let retry = self.config.timings.content_retry();
        tokio::spawn(async move {
            tokio::time::sleep(retry).await;
            if let Some(call) = call.upgrade() {
                call.data.lock().timers.content_retry.take();
                call.try_add_content();
            }
        })
    }

    pub(super) fn remove_pc_stream(&self, stream: &MediaStream) {
        info!(call_id = %self.id, "Removing PC stream {}", stream.id());
        let (senders, transport) = {
            let mut data = self.data.lock();
            if let Some(timer) = data.timers.content_retry.take() {
                timer.abort();
            }
            data.content_stream = None;
            (
                std::mem::take(&mut data.content_senders),
                data.transport.clone(),
            )
        };

        for track in stream.tracks() {
            track.stop();
        }

        let Some(transport) = transport else {
            return;
        };
        if transport.signaling_state() == SignalingState::Closed {
            return;
        }
        for sender in senders {
            if let Err(e) = transport.remove_track(sender) {
                warn!(call_id = %self.id, "Failed to remove PC sender: {}", e);
            }
        }
    }
}
