use tandem_client::{ConnectionState, TrackKind};

use crate::integration::{Harness, init_tracing, room, wait_for_state};
use crate::utils::MockCapture;

#[tokio::test]
async fn test_toggle_video_twice_restores_state() {
    init_tracing();

    let harness = Harness::new();
    let capture = MockCapture::new();
    let session = harness.join(&room("r1"), &capture);
    wait_for_state(&session, ConnectionState::AwaitingPeer).await;

    assert_eq!(session.toggle_video().await, Some(false));
    let snapshot = session.snapshot();
    assert!(!snapshot.video_enabled);
    assert!(snapshot.audio_enabled);
    assert_eq!(snapshot.connection_state, ConnectionState::AwaitingPeer);
    assert!(!capture.streams()[0].is_enabled(TrackKind::Video));

    assert_eq!(session.toggle_video().await, Some(true));
    let snapshot = session.snapshot();
    assert!(snapshot.video_enabled);
    assert_eq!(snapshot.connection_state, ConnectionState::AwaitingPeer);
    assert!(capture.streams()[0].is_enabled(TrackKind::Video));
}

#[tokio::test]
async fn test_toggle_audio_while_connected() {
    init_tracing();

    let harness = Harness::new();
    let room_id = room("r1");
    let capture = MockCapture::new();
    let a = harness.join(&room_id, &capture);
    wait_for_state(&a, ConnectionState::AwaitingPeer).await;
    let _b = harness.join(&room_id, &MockCapture::new());
    wait_for_state(&a, ConnectionState::Connected).await;

    assert_eq!(a.toggle_audio().await, Some(false));
    assert_eq!(a.state(), ConnectionState::Connected);
    assert!(!a.snapshot().audio_enabled);
    assert!(!capture.streams()[0].is_enabled(TrackKind::Audio));
}

#[tokio::test]
async fn test_toggles_before_media_have_no_effect() {
    init_tracing();

    let harness = Harness::new();
    let (capture, gate) = MockCapture::gated();
    let session = harness.join(&room("r1"), &capture);

    assert_eq!(session.toggle_video().await, None);
    assert_eq!(session.toggle_audio().await, None);
    let snapshot = session.snapshot();
    assert_eq!(snapshot.connection_state, ConnectionState::Initializing);
    assert!(!snapshot.video_enabled);
    assert!(!snapshot.audio_enabled);

    gate.notify_one();
    wait_for_state(&session, ConnectionState::AwaitingPeer).await;
    assert!(session.snapshot().video_enabled);
}

#[tokio::test]
async fn test_toggles_after_leave_have_no_effect() {
    init_tracing();

    let harness = Harness::new();
    let session = harness.join(&room("r1"), &MockCapture::new());
    wait_for_state(&session, ConnectionState::AwaitingPeer).await;
    session.leave().await;

    assert_eq!(session.toggle_video().await, None);
    assert_eq!(session.state(), ConnectionState::Left);
}
