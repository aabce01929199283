use tandem_server::Config;

use crate::integration::init_tracing;
use crate::utils::{BrokerTestClient, TestServer};

#[tokio::test]
async fn test_each_connection_gets_fresh_identity() {
    init_tracing();

    let server = TestServer::start(Config::default()).await;

    let a = BrokerTestClient::connect(&server.ws_url())
        .await
        .expect("Failed to connect A");
    let b = BrokerTestClient::connect(&server.ws_url())
        .await
        .expect("Failed to connect B");

    assert_ne!(a.peer_id, b.peer_id);
    assert!(server.state.signaling.is_connected(&a.peer_id));
    assert!(server.state.signaling.is_connected(&b.peer_id));
}
