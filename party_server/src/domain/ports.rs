use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::errors::{BusError, RegistryError};
use crate::domain::party::SyncSnapshot;
use crate::domain::track::CircuitConfig;

// Player record as stored by the lobby server.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub uuid: Uuid,
    pub name: String,
}

// Party creation record as stored by the lobby server.
#[derive(Debug, Clone, PartialEq)]
pub struct PartyRecord {
    pub uuid: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub circuit: CircuitConfig,
}

// Port for looking up registered players.
#[async_trait]
pub trait PlayerRegistry: Send + Sync {
    async fn get_player(&self, id: Uuid) -> Result<PlayerRecord, RegistryError>;
}

// Port for reading the party configuration once at startup.
#[async_trait]
pub trait PartyRegistry: Send + Sync {
    async fn get_party(&self, id: Uuid) -> Result<PartyRecord, RegistryError>;
}

/// A message taken off the bus.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub topic: String,
    pub payload: Arc<str>,
}

/// Receiving end of a topic subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    pub pattern: String,
    pub receiver: mpsc::Receiver<Delivery>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }
}

// Port for the topic-addressed publish/subscribe bus.
pub trait MessageBus: Send + Sync {
    /// Fire-and-forget; never blocks the caller.
    fn publish(&self, topic: &str, payload: Arc<str>) -> Result<(), BusError>;
    fn subscribe(&self, pattern: &str) -> Result<Subscription, BusError>;
}

// Port the simulation loop uses to push per-player state every tick.
pub trait SyncPublisher: Send + Sync {
    fn publish_snapshot(&self, party_id: Uuid, snapshot: &SyncSnapshot) -> Result<(), BusError>;
}
