use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("room id must not be empty")]
    EmptyRoomId,

    #[error("transport id must not be empty")]
    EmptyTransportId,
}
