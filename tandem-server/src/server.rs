use crate::config::Config;
use crate::rendezvous::{health, lookup_room, register_room};
use crate::signaling::{SignalingService, ws_handler};
use crate::store::{InMemoryStore, RegistrationStrategy, RendezvousStore};
use axum::Router;
use axum::extract::FromRef;
use axum::routing::get;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RendezvousStore>,
    pub registration_strategy: RegistrationStrategy,
    pub signaling: SignalingService,
}

impl AppState {
    /// State backed by the in-memory rendezvous directory.
    pub fn new(config: &Config) -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), config)
    }

    pub fn with_store(store: Arc<dyn RendezvousStore>, config: &Config) -> Self {
        Self {
            store,
            registration_strategy: config.registration_strategy,
            signaling: SignalingService::new(config.ice_servers.clone()),
        }
    }
}

impl FromRef<AppState> for SignalingService {
    fn from_ref(state: &AppState) -> Self {
        state.signaling.clone()
    }
}

/// Routes:
/// - `GET|POST /room/{id}` rendezvous lookup / registration
/// - `GET /peer` transport broker WebSocket
/// - `GET /health`
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/room/{id}", get(lookup_room).post(register_room))
        .route("/peer", get(ws_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(
        "Rendezvous server listening on http://{} (registration: {})",
        listener.local_addr()?,
        state.registration_strategy
    );

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Rendezvous server stopped");
    Ok(())
}
