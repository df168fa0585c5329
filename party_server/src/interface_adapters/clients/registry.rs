use crate::domain::RegistryError;
use crate::domain::ports::{PartyRecord, PartyRegistry, PlayerRecord, PlayerRegistry};
use crate::interface_adapters::protocol::CircuitConfigDto;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use uuid::Uuid;

// Player record as served by the lobby server.
#[derive(Debug, Clone, Deserialize)]
struct PlayerResponse {
    uuid: Uuid,
    name: String,
}

// Party configuration as served by the lobby server.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartyResponse {
    uuid: Uuid,
    owner_id: Uuid,
    name: String,
    circuit_config: CircuitConfigDto,
}

// Thin reqwest client for the lobby server's player and party records.
#[derive(Clone)]
pub struct HttpRegistry {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRegistry {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T, RegistryError> {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|_| RegistryError::Unavailable)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound);
        }
        if !response.status().is_success() {
            return Err(RegistryError::Unavailable);
        }

        response
            .json::<T>()
            .await
            .map_err(|e| RegistryError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PlayerRegistry for HttpRegistry {
    async fn get_player(&self, id: Uuid) -> Result<PlayerRecord, RegistryError> {
        let player: PlayerResponse = self.fetch(&format!("players/{id}")).await?;
        Ok(PlayerRecord {
            uuid: player.uuid,
            name: player.name,
        })
    }
}

#[async_trait]
impl PartyRegistry for HttpRegistry {
    async fn get_party(&self, id: Uuid) -> Result<PartyRecord, RegistryError> {
        let party: PartyResponse = self.fetch(&format!("parties/{id}")).await?;
        Ok(PartyRecord {
            uuid: party.uuid,
            owner_id: party.owner_id,
            name: party.name,
            circuit: party.circuit_config.into(),
        })
    }
}
