use tandem_client::{ConnectionState, SessionRole};

use crate::integration::{Harness, init_tracing, room, wait_for_state};
use crate::utils::MockCapture;

#[tokio::test]
async fn test_bound_room_makes_the_client_call_the_host() {
    init_tracing();

    let harness = Harness::new();
    let room_id = room("r1");
    let host = harness.hub.transport().endpoint().await;
    harness.rendezvous.bind(&room_id, &host.id());

    let session = harness.join(&room_id, &MockCapture::new());
    wait_for_state(&session, ConnectionState::Connecting).await;

    let local_id = session.snapshot().local_id.unwrap();
    assert_eq!(session.snapshot().role, Some(SessionRole::Guest));
    assert_eq!(harness.hub.calls(), vec![(local_id.clone(), host.id())]);
    assert!(harness.rendezvous.registrations().is_empty());
    assert_eq!(harness.rendezvous.host_of(&room_id), Some(host.id()));

    let incoming = host.accept().await.unwrap();
    assert_eq!(incoming.peer(), &local_id);
}

#[tokio::test]
async fn test_guest_connects_when_the_host_answers() {
    init_tracing();

    let harness = Harness::new();
    let room_id = room("r1");
    let host = harness.hub.transport().endpoint().await;
    harness.rendezvous.bind(&room_id, &host.id());
    let host_capture = MockCapture::new();
    let host_stream = {
        use tandem_client::{MediaCapture, MediaConstraints};
        host_capture.acquire(MediaConstraints::default()).await.unwrap()
    };

    let session = harness.join(&room_id, &MockCapture::new());
    let incoming = host.accept().await.unwrap();
    let _call = incoming.answer(&host_stream).await.unwrap();

    wait_for_state(&session, ConnectionState::Connected).await;
    assert!(session.snapshot().remote_stream_present);
    assert_eq!(
        session.remote_stream().await.unwrap().id(),
        host_stream.id()
    );
    assert_eq!(harness.hub.calls().len(), 1);
}
