// In-memory registry for local runs and tests; optionally seeded from TOML.
//
// ```toml
// [[players]]
// uuid = "6f1c..."
// name = "ana"
//
// [[parties]]
// uuid = "0b7e..."
// owner_id = "6f1c..."
// name = "sunday cup"
// circuit = { seed = 1, min_point = 50, max_point = 100, x_size = 4000.0, y_size = 4000.0 }
// ```

use crate::domain::ports::{PartyRecord, PartyRegistry, PlayerRecord, PlayerRegistry};
use crate::domain::{CircuitConfig, RegistryError};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    players: Vec<PlayerEntry>,
    #[serde(default)]
    parties: Vec<PartyEntry>,
}

#[derive(Debug, Deserialize)]
struct PlayerEntry {
    uuid: Uuid,
    name: String,
}

#[derive(Debug, Deserialize)]
struct PartyEntry {
    uuid: Uuid,
    owner_id: Uuid,
    name: String,
    circuit: CircuitEntry,
}

#[derive(Debug, Deserialize)]
struct CircuitEntry {
    #[serde(default)]
    seed: i64,
    min_point: usize,
    max_point: usize,
    x_size: f64,
    y_size: f64,
}

#[derive(Debug, Default, Clone)]
pub struct MemoryRegistry {
    players: HashMap<Uuid, PlayerRecord>,
    parties: HashMap<Uuid, PartyRecord>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_player(mut self, uuid: Uuid, name: impl Into<String>) -> Self {
        self.players.insert(
            uuid,
            PlayerRecord {
                uuid,
                name: name.into(),
            },
        );
        self
    }

    pub fn with_party(mut self, record: PartyRecord) -> Self {
        self.parties.insert(record.uuid, record);
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile =
            toml::from_str(text).map_err(|e| RegistryError::Decode(e.to_string()))?;

        let mut registry = Self::new();
        for player in file.players {
            registry = registry.with_player(player.uuid, player.name);
        }
        for party in file.parties {
            registry = registry.with_party(PartyRecord {
                uuid: party.uuid,
                owner_id: party.owner_id,
                name: party.name,
                circuit: CircuitConfig {
                    seed: party.circuit.seed,
                    min_point: party.circuit.min_point,
                    max_point: party.circuit.max_point,
                    x_size: party.circuit.x_size,
                    y_size: party.circuit.y_size,
                },
            });
        }
        Ok(registry)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            RegistryError::Decode(format!("{}: {e}", path.as_ref().display()))
        })?;
        Self::from_toml_str(&text)
    }
}

#[async_trait]
impl PlayerRegistry for MemoryRegistry {
    async fn get_player(&self, id: Uuid) -> Result<PlayerRecord, RegistryError> {
        self.players.get(&id).cloned().ok_or(RegistryError::NotFound)
    }
}

#[async_trait]
impl PartyRegistry for MemoryRegistry {
    async fn get_party(&self, id: Uuid) -> Result<PartyRecord, RegistryError> {
        self.parties.get(&id).cloned().ok_or(RegistryError::NotFound)
    }
}
