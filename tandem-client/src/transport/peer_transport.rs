use crate::media::LocalStream;
use crate::transport::{CallError, IncomingCall, MediaCall};
use async_trait::async_trait;
use std::sync::Arc;
use tandem_core::TransportId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("transport broker unreachable: {0}")]
    Unreachable(String),

    #[error("transport identity rejected: {0}")]
    Rejected(String),

    #[error("transport identity lost")]
    Lost,

    #[error("transport does not support reconnecting in place")]
    ReconnectUnsupported,
}

/// Creates local transport identities.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn create_identity(&self) -> Result<Arc<dyn PeerEndpoint>, IdentityError>;
}

/// A live transport identity that can place and receive calls.
#[async_trait]
pub trait PeerEndpoint: Send + Sync {
    fn id(&self) -> TransportId;

    async fn call(&self, remote: &TransportId, local: &LocalStream)
    -> Result<MediaCall, CallError>;

    /// Waits for the next incoming call. Fails with `IdentityError::Lost` once
    /// the identity is gone.
    async fn accept(&self) -> Result<IncomingCall, IdentityError>;

    /// Re-establish a lost identity under the same id.
    async fn reconnect(&self) -> Result<(), IdentityError> {
        Err(IdentityError::ReconnectUnsupported)
    }

    async fn destroy(&self);
}
