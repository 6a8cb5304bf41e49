//! Call session controller
//!
//! A [`Call`] drives one outbound call from `dial` to `ended`. It owns the
//! negotiation engine and the stats tracker and reacts to the user agent
//! and transport through the [`SignalingHandle`] given to the
//! [`SignalingConnector`](crate::signaling::SignalingConnector).
//!
//! Handlers registered with [`Call::on`] run on whichever task delivers the
//! triggering event, never while the call's own state is locked, so they may
//! call back into the call.

mod content;
mod controller;
mod lifecycle;
mod renegotiation;

pub use controller::{Call, CallState, ReinviteCompletion, SignalingHandle};
