use crate::media::MediaError;
use crate::rendezvous::RendezvousError;
use crate::session::{ConnectionState, ErrorKind};
use crate::transport::{CallError, IdentityError};
use thiserror::Error;

/// Why a session attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Call(#[from] CallError),

    #[error(transparent)]
    Rendezvous(#[from] RendezvousError),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Media(_) => ErrorKind::Media,
            SessionError::Identity(_) => ErrorKind::Identity,
            SessionError::Call(_) => ErrorKind::Call,
            SessionError::Rendezvous(_) => ErrorKind::Rendezvous,
        }
    }
}

/// Misuse of a session control operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("retry is only possible after a failure (session is {0})")]
    NotFailed(ConnectionState),
}
