//! Call lifecycle: dialling, answering, and every way a call ends

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use webcall_call_core::{
    Call, CallEndReason, CallEvent, CallEventKind, CallState, MediaStream, MediaTrack, MuteState,
    Originator, SessionEndInfo, SignalingCause, SignalingEvent, TransportEvent,
};

fn ended_reasons(events: &[CallEvent]) -> Vec<CallEndReason> {
    events
        .iter()
        .filter_map(|event| match event {
            CallEvent::Ended(reason) => Some(*reason),
            _ => None,
        })
        .collect()
}

fn count(events: &[CallEvent], kind: CallEventKind) -> usize {
    events.iter().filter(|event| event.kind() == kind).count()
}

#[tokio::test]
async fn test_dial_and_answer() {
    let harness = CallHarness::new(test_config());
    let events = record(&harness.call, &[CallEventKind::Ringing, CallEventKind::InCall]);

    harness.dial();
    assert_eq!(harness.call.state(), CallState::Dialing);
    assert!(harness.connector.agent.started.load(Ordering::SeqCst));
    let ua = harness.connector.ua_config.lock().clone().unwrap();
    assert_eq!(ua.uri, "unknown@example.com");
    assert_eq!(ua.display_name, "Ada");

    harness.handle().dispatch(SignalingEvent::Connected);
    assert_eq!(harness.call.state(), CallState::Ringing);
    assert_eq!(
        *harness.connector.agent.invites.lock(),
        vec!["sip:room@example.com".to_string()]
    );

    harness
        .handle()
        .dispatch(SignalingEvent::NewSession(harness.session.clone()));
    harness
        .handle()
        .dispatch(SignalingEvent::PeerConnectionCreated(harness.transport.clone()));
    assert_eq!(harness.call.state(), CallState::Connected);

    harness.handle().dispatch(SignalingEvent::Confirmed);
    assert_eq!(harness.call.state(), CallState::InCall);

    let events = events.lock();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], CallEvent::Ringing));
    assert!(matches!(events[1], CallEvent::InCall));
}

#[test]
fn test_dial_rejects_oversized_video() {
    let call = Call::new(test_config(), MockConnector::new()).unwrap();
    let err = call.dial(main_stream(1920, 1080)).unwrap_err();
    assert!(err.is_validation());
    assert_eq!(call.state(), CallState::Idle);
}

#[tokio::test]
async fn test_dial_twice_is_rejected() {
    let harness = CallHarness::new(test_config());
    harness.dial();
    assert!(harness.call.dial(main_stream(640, 480)).is_err());
}

#[tokio::test]
async fn test_failed_start_returns_to_idle() {
    let harness = CallHarness::new(test_config());
    harness.connector.agent.fail_start.store(true, Ordering::SeqCst);
    assert!(harness.call.dial(main_stream(1280, 720)).is_err());
    assert_eq!(harness.call.state(), CallState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_connection_timeout() {
    let harness = CallHarness::new(test_config());
    let events = record(&harness.call, &[CallEventKind::Ending, CallEventKind::Ended]);

    harness.dial();
    tokio::time::advance(Duration::from_millis(9999)).await;
    settle().await;
    assert_eq!(harness.call.state(), CallState::Dialing);
    assert!(events.lock().is_empty());

    tokio::time::advance(Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(harness.call.state(), CallState::Ended);
    assert_eq!(
        ended_reasons(&events.lock()),
        vec![CallEndReason::ConnectionTimeout]
    );
    assert_eq!(count(&events.lock(), CallEventKind::Ending), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connected_websocket_cancels_timeout() {
    let harness = CallHarness::new(test_config());
    harness.dial();
    harness.handle().dispatch(SignalingEvent::Connected);

    tokio::time::advance(Duration::from_secs(20)).await;
    settle().await;
    assert_eq!(harness.call.state(), CallState::Ringing);
    assert_eq!(harness.call.end_reason(), None);
}

#[tokio::test]
async fn test_remote_bye() {
    let harness = CallHarness::new(test_config());
    let events = record(&harness.call, &[CallEventKind::Ending, CallEventKind::Ended]);
    harness.answer();

    harness.handle().dispatch(SignalingEvent::Ended(SessionEndInfo::new(
        Originator::Remote,
        SignalingCause::Bye,
    )));

    assert_eq!(harness.call.state(), CallState::Ended);
    assert_eq!(ended_reasons(&events.lock()), vec![CallEndReason::RemoteBye]);
    assert_eq!(count(&events.lock(), CallEventKind::Ending), 1);
}

#[tokio::test]
async fn test_busy_failure() {
    let harness = CallHarness::new(test_config());
    let events = record(&harness.call, &[CallEventKind::Ended]);
    harness.connect();

    harness.handle().dispatch(SignalingEvent::Failed(SessionEndInfo::new(
        Originator::Remote,
        SignalingCause::from_name("Busy"),
    )));

    assert_eq!(ended_reasons(&events.lock()), vec![CallEndReason::Busy]);
}

#[tokio::test]
async fn test_user_hangup() {
    let harness = CallHarness::new(test_config());
    let events = record(&harness.call, &[CallEventKind::Ended]);
    harness.answer();

    harness.call.hangup();
    assert_eq!(harness.call.state(), CallState::Ended);
    assert_eq!(ended_reasons(&events.lock()), vec![CallEndReason::UserBye]);
    assert_eq!(harness.connector.agent.stops.load(Ordering::SeqCst), 1);

    // Nothing left to hang up
    harness.call.hangup();
    assert_eq!(harness.connector.agent.stops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_hangup_before_dial_is_ignored() {
    let call = Call::new(test_config(), MockConnector::new()).unwrap();
    call.hangup();
    assert_eq!(call.state(), CallState::Idle);
    assert_eq!(call.end_reason(), None);
}

#[tokio::test]
async fn test_ice_failure_ends_once() {
    let harness = CallHarness::new(test_config());
    let events = record(&harness.call, &[CallEventKind::Ending, CallEventKind::Ended]);
    harness.answer();

    harness
        .handle()
        .transport_event(TransportEvent::IceStateChanged(ice_failed()));
    harness.handle().dispatch(SignalingEvent::Failed(SessionEndInfo::new(
        Originator::Local,
        SignalingCause::ConnectionError,
    )));

    assert_eq!(ended_reasons(&events.lock()), vec![CallEndReason::IceFailure]);
    assert_eq!(count(&events.lock(), CallEventKind::Ending), 1);
    assert_eq!(harness.call.end_reason(), Some(CallEndReason::IceFailure));
}

#[tokio::test]
async fn test_websocket_refused() {
    let harness = CallHarness::new(test_config());
    let events = record(&harness.call, &[CallEventKind::Ended]);
    harness.dial();

    harness
        .handle()
        .dispatch(SignalingEvent::Disconnected { code: 1006 });

    assert_eq!(
        ended_reasons(&events.lock()),
        vec![CallEndReason::ConnectionRefused]
    );
}

#[tokio::test]
async fn test_websocket_lost_after_connect() {
    let harness = CallHarness::new(test_config());
    let events = record(&harness.call, &[CallEventKind::Ended]);
    harness.dial();
    harness.handle().dispatch(SignalingEvent::Connected);

    harness
        .handle()
        .dispatch(SignalingEvent::Disconnected { code: 1006 });

    assert_eq!(
        ended_reasons(&events.lock()),
        vec![CallEndReason::ConnectionError]
    );
}

#[tokio::test(start_paused = true)]
async fn test_hangup_waits_for_renegotiation() {
    let harness = CallHarness::new(test_config());
    let events = record(&harness.call, &[CallEventKind::Ended, CallEventKind::Renegotiated]);
    harness.transport.set_report(SELECTED_PAIR_REPORT);
    *harness.session.renegotiate_delay.lock() = Duration::from_millis(200);
    harness.answer();

    harness
        .handle()
        .transport_event(TransportEvent::IceStateChanged(ice_settled()));
    settle().await;
    assert_eq!(harness.session.renegotiation_count(), 1);

    harness.call.hangup();
    assert_eq!(harness.connector.agent.stops.load(Ordering::SeqCst), 0);
    assert_ne!(harness.call.state(), CallState::Ended);

    tokio::time::advance(Duration::from_millis(200)).await;
    settle().await;

    assert_eq!(harness.connector.agent.stops.load(Ordering::SeqCst), 1);
    assert_eq!(ended_reasons(&events.lock()), vec![CallEndReason::UserBye]);
    assert_eq!(count(&events.lock(), CallEventKind::Renegotiated), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hangup_grace_expires() {
    let harness = CallHarness::new(test_config());
    let events = record(&harness.call, &[CallEventKind::Ended]);
    harness.transport.set_report(SELECTED_PAIR_REPORT);
    *harness.session.renegotiate_delay.lock() = Duration::from_secs(30);
    harness.answer();

    harness
        .handle()
        .transport_event(TransportEvent::IceStateChanged(ice_settled()));
    settle().await;
    harness.call.hangup();

    tokio::time::advance(Duration::from_millis(999)).await;
    settle().await;
    assert!(events.lock().is_empty());

    tokio::time::advance(Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(ended_reasons(&events.lock()), vec![CallEndReason::UserBye]);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_hangup_keeps_grace_timer() {
    let harness = CallHarness::new(test_config());
    let events = record(&harness.call, &[CallEventKind::Ending, CallEventKind::Ended]);
    harness.transport.set_report(SELECTED_PAIR_REPORT);
    *harness.session.renegotiate_delay.lock() = Duration::from_secs(30);
    harness.answer();

    harness
        .handle()
        .transport_event(TransportEvent::IceStateChanged(ice_settled()));
    settle().await;
    harness.call.hangup();
    harness.call.hangup();

    tokio::time::advance(Duration::from_millis(1000)).await;
    settle().await;
    assert_eq!(harness.connector.agent.stops.load(Ordering::SeqCst), 1);
    assert_eq!(ended_reasons(&events.lock()), vec![CallEndReason::UserBye]);
    assert_eq!(count(&events.lock(), CallEventKind::Ending), 1);
}

#[tokio::test]
async fn test_clean_close_during_call() {
    let harness = CallHarness::new(test_config());
    let events = record(&harness.call, &[CallEventKind::Ending, CallEventKind::Ended]);
    harness.answer();

    harness
        .handle()
        .dispatch(SignalingEvent::Disconnected { code: 1000 });

    let events = events.lock();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], CallEvent::Ending));
    assert!(matches!(
        events[1],
        CallEvent::Ended(CallEndReason::ConnectionError)
    ));
    assert_eq!(harness.call.state(), CallState::Ended);
}

#[tokio::test]
async fn test_reinvite_restores_mute_status() {
    let harness = CallHarness::new(test_config());
    harness.answer();
    assert!(harness.call.mute(MuteState::audio(true)));

    let completion = harness.handle().reinvite_requested();
    assert!(completion.mute_status().audio);

    // The user agent resets mute state while answering
    harness.call.mute(MuteState::audio(false));
    assert!(!harness.call.is_muted().audio);

    completion.complete();
    assert!(harness.call.is_muted().audio);
    assert!(!harness.call.is_muted().video);
}

#[test]
fn test_mute_without_session() {
    let call = Call::new(test_config(), MockConnector::new()).unwrap();
    assert!(!call.mute(MuteState::video(true)));
}

proptest! {
    #[test]
    fn dial_accepts_streams_within_limits(
        video in proptest::option::of((1u32..=1280, 1u32..=720)),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let _guard = runtime.enter();

        let mut tracks = vec![MockTrack::audio() as Arc<dyn MediaTrack>];
        if let Some((width, height)) = video {
            tracks.push(MockTrack::video(width, height) as Arc<dyn MediaTrack>);
        }
        let call = Call::new(test_config(), MockConnector::new()).unwrap();
        prop_assert!(call.dial(MediaStream::new("main", tracks)).is_ok());
        prop_assert_eq!(call.state(), CallState::Dialing);
    }

    #[test]
    fn dial_rejects_main_video_wider_than_limit(width in 1281u32..8000, height in 1u32..720) {
        let call = Call::new(test_config(), MockConnector::new()).unwrap();
        let err = call.dial(main_stream(width, height)).unwrap_err();
        prop_assert!(err.is_validation());
        prop_assert_eq!(call.state(), CallState::Idle);
    }

    #[test]
    fn dial_rejects_main_video_taller_than_limit(width in 1u32..1280, height in 721u32..8000) {
        let call = Call::new(test_config(), MockConnector::new()).unwrap();
        prop_assert!(call.dial(main_stream(width, height)).unwrap_err().is_validation());
    }
}
