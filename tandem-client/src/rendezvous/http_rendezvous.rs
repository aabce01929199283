use crate::rendezvous::{RendezvousClient, RendezvousError};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use tandem_core::{LookupResponse, RegisterRequest, RegisterResponse, RoomId, TransportId};
use tracing::debug;

/// `RendezvousClient` over the server's `/room/{id}` HTTP surface.
#[derive(Debug, Clone)]
pub struct HttpRendezvous {
    base_url: Url,
    http: Client,
}

impl HttpRendezvous {
    pub fn new(base_url: &str) -> Result<Self, RendezvousError> {
        let base_url =
            Url::parse(base_url).map_err(|e| RendezvousError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(RendezvousError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            base_url,
            http: Client::new(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn room_url(&self, room_id: &RoomId) -> Result<Url, RendezvousError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RendezvousError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("room")
            .push(room_id.as_str());
        Ok(url)
    }
}

fn check_status(response: Response) -> Result<Response, RendezvousError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(RendezvousError::Status(status.as_u16()))
    }
}

#[async_trait]
impl RendezvousClient for HttpRendezvous {
    async fn lookup(&self, room_id: &RoomId) -> Result<Option<TransportId>, RendezvousError> {
        let url = self.room_url(room_id)?;
        debug!("GET {}", url);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| RendezvousError::Network(e.to_string()))?;
        let body: LookupResponse = check_status(response)?
            .json()
            .await
            .map_err(|e| RendezvousError::Decode(e.to_string()))?;
        Ok(body.host_id)
    }

    async fn register(
        &self,
        room_id: &RoomId,
        transport_id: &TransportId,
    ) -> Result<bool, RendezvousError> {
        let url = self.room_url(room_id)?;
        debug!("POST {} as {}", url, transport_id);
        let response = self
            .http
            .post(url)
            .json(&RegisterRequest {
                id: transport_id.to_string(),
            })
            .send()
            .await
            .map_err(|e| RendezvousError::Network(e.to_string()))?;
        let body: RegisterResponse = check_status(response)?
            .json()
            .await
            .map_err(|e| RendezvousError::Decode(e.to_string()))?;
        Ok(body.success)
    }
}
