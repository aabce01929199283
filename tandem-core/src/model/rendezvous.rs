use crate::model::TransportId;
use serde::{Deserialize, Serialize};

/// Body of `GET /room/{id}`. `host_id` is `null` when the room is unbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResponse {
    pub host_id: Option<TransportId>,
}

/// Body of `POST /room/{id}`: the registering client's transport identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
}
