use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity assigned by the peer-to-peer transport layer; used to address a
/// specific client for call setup.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq)]
#[serde(try_from = "String", into = "String")]
pub struct TransportId(String);

impl TransportId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TransportId {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<String> for TransportId {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(ModelError::EmptyTransportId);
        }
        Ok(Self(value))
    }
}

impl TryFrom<&str> for TransportId {
    type Error = ModelError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_owned())
    }
}

impl From<TransportId> for String {
    fn from(id: TransportId) -> Self {
        id.0
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
