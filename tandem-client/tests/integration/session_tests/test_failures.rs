use std::time::Duration;

use tandem_client::{
    CallError, ConnectionState, ErrorKind, IdentityError, RendezvousError, SessionConfig,
    SessionError,
};
use tandem_core::TransportId;

use crate::integration::{Harness, init_tracing, room, wait_for_state};
use crate::utils::MockCapture;

#[tokio::test]
async fn test_rendezvous_failure_is_not_an_empty_room() {
    init_tracing();

    let harness = Harness::new();
    harness.rendezvous.set_unreachable(true);
    let capture = MockCapture::new();
    let session = harness.join(&room("r1"), &capture);

    wait_for_state(&session, ConnectionState::Failed(ErrorKind::Rendezvous)).await;
    let snapshot = session.snapshot();
    assert!(matches!(
        snapshot.last_error,
        Some(SessionError::Rendezvous(RendezvousError::Network(_)))
    ));
    assert!(harness.rendezvous.registrations().is_empty());

    // Terminal failure releases what the attempt held.
    assert!(capture.streams()[0].is_stopped());
    assert_eq!(
        harness.hub.destroyed(),
        vec![snapshot.local_id.unwrap()]
    );
}

#[tokio::test]
async fn test_identity_failure() {
    init_tracing();

    let harness = Harness::new();
    harness.hub.set_fail_identity(true);
    let capture = MockCapture::new();
    let session = harness.join(&room("r1"), &capture);

    wait_for_state(&session, ConnectionState::Failed(ErrorKind::Identity)).await;
    assert!(matches!(
        session.snapshot().last_error,
        Some(SessionError::Identity(IdentityError::Unreachable(_)))
    ));
    assert!(capture.streams()[0].is_stopped());
}

#[tokio::test]
async fn test_call_to_vanished_host_fails() {
    init_tracing();

    let harness = Harness::new();
    let room_id = room("r1");
    let ghost = TransportId::try_from("ghost").unwrap();
    harness.rendezvous.bind(&room_id, &ghost);

    let session = harness.join(&room_id, &MockCapture::new());
    wait_for_state(&session, ConnectionState::Failed(ErrorKind::Call)).await;
    assert_eq!(
        session.snapshot().last_error,
        Some(SessionError::Call(CallError::PeerUnavailable(ghost)))
    );
}

#[tokio::test]
async fn test_negotiation_failure() {
    init_tracing();

    let harness = Harness::new();
    let room_id = room("r1");
    let host = harness.hub.transport().endpoint().await;
    harness.rendezvous.bind(&room_id, &host.id());
    harness.hub.set_fail_calls(true);

    let session = harness.join(&room_id, &MockCapture::new());
    wait_for_state(&session, ConnectionState::Failed(ErrorKind::Call)).await;
    assert!(matches!(
        session.snapshot().last_error,
        Some(SessionError::Call(CallError::Negotiation(_)))
    ));
}

#[tokio::test]
async fn test_call_closed_before_media() {
    init_tracing();

    let harness = Harness::new();
    let room_id = room("r1");
    let host = harness.hub.transport().endpoint().await;
    harness.rendezvous.bind(&room_id, &host.id());

    let session = harness.join(&room_id, &MockCapture::new());
    let incoming = host.accept().await.unwrap();
    incoming.decline().await;

    wait_for_state(&session, ConnectionState::Failed(ErrorKind::Call)).await;
    assert_eq!(
        session.snapshot().last_error,
        Some(SessionError::Call(CallError::ClosedBeforeMedia))
    );
}

#[tokio::test]
async fn test_identity_lost_while_awaiting_peer() {
    init_tracing();

    let harness = Harness::new();
    let session = harness.join(&room("r1"), &MockCapture::new());
    wait_for_state(&session, ConnectionState::AwaitingPeer).await;

    harness
        .hub
        .drop_identity(&session.snapshot().local_id.unwrap());

    wait_for_state(&session, ConnectionState::Failed(ErrorKind::Identity)).await;
    assert_eq!(
        session.snapshot().last_error,
        Some(SessionError::Identity(IdentityError::ReconnectUnsupported))
    );
}

#[tokio::test]
async fn test_identity_reconnected_in_place() {
    init_tracing();

    let harness = Harness::new();
    harness.hub.set_reconnectable(true);
    let room_id = room("r1");
    let a = harness.join(&room_id, &MockCapture::new());
    wait_for_state(&a, ConnectionState::AwaitingPeer).await;
    let a1 = a.snapshot().local_id.unwrap();

    harness.hub.drop_identity(&a1);
    tokio::time::timeout(Duration::from_secs(5), async {
        while !harness.hub.is_online(&a1) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(a.state(), ConnectionState::AwaitingPeer);

    let b = harness.join(&room_id, &MockCapture::new());
    wait_for_state(&b, ConnectionState::Connected).await;
    wait_for_state(&a, ConnectionState::Connected).await;
}

#[tokio::test(start_paused = true)]
async fn test_waiting_for_a_peer_can_time_out() {
    init_tracing();

    let harness = Harness::new();
    let capture = MockCapture::new();
    let config = SessionConfig {
        await_peer_timeout: Some(Duration::from_secs(1)),
        ..Default::default()
    };
    let session = tandem_client::CallSession::start(room("r1"), harness.services(&capture), config);

    wait_for_state(&session, ConnectionState::Failed(ErrorKind::Call)).await;
    assert_eq!(
        session.snapshot().last_error,
        Some(SessionError::Call(CallError::Timeout("the other participant")))
    );
    assert!(capture.streams()[0].is_stopped());
}

#[tokio::test]
async fn test_transport_error_while_connected_fails_the_call() {
    init_tracing();

    let harness = Harness::new();
    let room_id = room("r1");
    let (a_capture, b_capture) = (MockCapture::new(), MockCapture::new());
    let a = harness.join(&room_id, &a_capture);
    wait_for_state(&a, ConnectionState::AwaitingPeer).await;
    let b = harness.join(&room_id, &b_capture);
    wait_for_state(&a, ConnectionState::Connected).await;
    wait_for_state(&b, ConnectionState::Connected).await;

    harness
        .hub
        .fail_open_calls(CallError::Transport("ice failed".into()));

    wait_for_state(&a, ConnectionState::Failed(ErrorKind::Call)).await;
    wait_for_state(&b, ConnectionState::Failed(ErrorKind::Call)).await;
    assert_eq!(
        b.snapshot().last_error,
        Some(SessionError::Call(CallError::Transport("ice failed".into())))
    );
    assert!(!b.snapshot().remote_stream_present);
    assert!(b.remote_stream().await.is_none());
    assert!(a_capture.streams()[0].is_stopped());
    assert!(b_capture.streams()[0].is_stopped());
    assert_eq!(harness.hub.destroyed().len(), 2);
}

#[tokio::test]
async fn test_signaling_lost_while_connecting_is_an_identity_failure() {
    init_tracing();

    let harness = Harness::new();
    let room_id = room("r1");
    // A host that never answers keeps the guest in Connecting.
    let host = harness.hub.transport().endpoint().await;
    harness.rendezvous.bind(&room_id, &host.id());

    let capture = MockCapture::new();
    let session = harness.join(&room_id, &capture);
    tokio::time::timeout(Duration::from_secs(5), async {
        while harness.hub.calls().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(session.state(), ConnectionState::Connecting);

    harness.hub.fail_open_calls(CallError::SignalingLost);

    wait_for_state(&session, ConnectionState::Failed(ErrorKind::Identity)).await;
    assert_eq!(
        session.snapshot().last_error,
        Some(SessionError::Identity(IdentityError::Lost))
    );
    assert!(capture.streams()[0].is_stopped());
    assert_eq!(harness.hub.closed_calls(), 1);
}
