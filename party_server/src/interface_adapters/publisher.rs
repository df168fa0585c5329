// Tick broadcaster: serializes sync snapshots onto per-player topics.

use crate::domain::ports::{MessageBus, SyncPublisher};
use crate::domain::{BusError, SyncSnapshot};
use crate::interface_adapters::protocol::SyncPayloadDto;
use crate::interface_adapters::topics::PartyTopics;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

pub struct BusSyncPublisher {
    bus: Arc<dyn MessageBus>,
    topics: PartyTopics,
}

impl BusSyncPublisher {
    pub fn new(bus: Arc<dyn MessageBus>, party_id: Uuid) -> Self {
        Self {
            bus,
            topics: PartyTopics::new(party_id),
        }
    }
}

impl SyncPublisher for BusSyncPublisher {
    fn publish_snapshot(&self, _party_id: Uuid, snapshot: &SyncSnapshot) -> Result<(), BusError> {
        let payload = match serde_json::to_string(&SyncPayloadDto::from(snapshot)) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = ?e, "failed to serialize sync payload");
                return Ok(());
            }
        };
        self.bus
            .publish(&self.topics.sync_for(snapshot.main.uuid), Arc::from(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PartyState, Player};
    use crate::interface_adapters::bus::TopicExchange;

    #[tokio::test]
    async fn when_snapshot_published_then_lands_on_player_sync_topic() {
        let bus = Arc::new(TopicExchange::new(8));
        let party_id = Uuid::new_v4();
        let player = Player::new(Uuid::new_v4(), "racer");
        let mut sub = bus
            .subscribe(&format!("party.{party_id}.sync.{}", player.uuid))
            .expect("subscribe");

        let publisher = BusSyncPublisher::new(bus.clone(), party_id);
        publisher
            .publish_snapshot(
                party_id,
                &SyncSnapshot {
                    state: PartyState::Run,
                    main: player,
                    rank: 0,
                    competitors: vec![],
                },
            )
            .expect("publish");

        let delivery = sub.recv().await.expect("delivery");
        let payload: SyncPayloadDto = serde_json::from_str(&delivery.payload).expect("json");
        assert_eq!(payload.party_state, 1);
        assert_eq!(payload.main_actor.actor.name, "racer");
    }
}
