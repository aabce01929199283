use std::net::SocketAddr;
use tandem_server::{AppState, Config, serve};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Real server bound to an ephemeral port; stops when dropped.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn start(config: Config) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("listener has an address");

        let state = AppState::new(&config);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn({
            let state = state.clone();
            async move {
                let _ = serve(listener, state, async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            }
        });

        Self {
            addr,
            state,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/peer", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
