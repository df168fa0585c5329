// The four request listeners of a party.
//
// Each listener owns one subscription, decodes the payload for its topic and
// turns it into a command for the party task. Replies go to the requester's
// address. Requester mistakes become an error envelope on the canonical topic;
// registry misses are logged and the request is dropped.

use crate::domain::ports::{MessageBus, PlayerRegistry, Subscription};
use crate::domain::{BusError, PartyState, Player, PlayerInput, RegistryError};
use crate::interface_adapters::protocol::{
    DecodeError, ErrorEnvelope, InboundMessage, PartyDto, PlayerTokenDto, RequestKind,
    StateChangeAckDto, SyncPayloadDto,
};
use crate::interface_adapters::topics::{PartyTopics, player_suffix, resolve_reply};
use crate::use_cases::{CommandError, PartyHandle};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

const LOG_THROTTLE: Duration = Duration::from_secs(2);

// Startup order; the simulation only starts once all of them are ready.
const LISTENER_ORDER: [RequestKind; 4] = [
    RequestKind::AddPlayer,
    RequestKind::ChangeState,
    RequestKind::Sync,
    RequestKind::Input,
];

#[derive(Debug)]
pub enum ListenerError {
    // Categorizes request failures so the listener can pick reply or drop.
    Decode(DecodeError),
    WrongParty(Uuid),
    Registry(RegistryError),
    NotInParty(Uuid),
    PartyClosed,
    Serialization(serde_json::Error),
    Bus(BusError),
}

impl ListenerError {
    // Requester mistakes are answered; lookups and server-side failures are only logged.
    fn is_reportable(&self) -> bool {
        matches!(
            self,
            ListenerError::Decode(_) | ListenerError::WrongParty(_) | ListenerError::NotInParty(_)
        )
    }
}

impl fmt::Display for ListenerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerError::Decode(e) => write!(f, "{e}"),
            ListenerError::WrongParty(id) => write!(f, "request addressed to party {id}"),
            ListenerError::Registry(e) => write!(f, "player lookup failed: {e}"),
            ListenerError::NotInParty(id) => write!(f, "player {id} is not in the party"),
            ListenerError::PartyClosed => write!(f, "party is closed"),
            ListenerError::Serialization(e) => write!(f, "failed to serialize reply: {e}"),
            ListenerError::Bus(e) => write!(f, "failed to publish reply: {e}"),
        }
    }
}

impl std::error::Error for ListenerError {}

impl From<CommandError> for ListenerError {
    fn from(_: CommandError) -> Self {
        ListenerError::PartyClosed
    }
}

/// Everything a listener needs to serve requests for one party.
#[derive(Clone)]
pub struct ListenerContext {
    pub bus: Arc<dyn MessageBus>,
    pub party: PartyHandle,
    pub players: Arc<dyn PlayerRegistry>,
    pub topics: PartyTopics,
}

impl ListenerContext {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        party: PartyHandle,
        players: Arc<dyn PlayerRegistry>,
    ) -> Self {
        let topics = PartyTopics::new(party.party_id);
        Self {
            bus,
            party,
            players,
            topics,
        }
    }

    fn canonical(&self, kind: RequestKind) -> String {
        self.topics
            .response(kind)
            .unwrap_or_else(|| self.topics.request(kind))
    }

    // Explicit reply address wins over the per-player suffix.
    fn reply_topic(&self, kind: RequestKind, token: &PlayerTokenDto) -> String {
        let address = token
            .reply_to
            .clone()
            .unwrap_or_else(|| player_suffix(token.client_id));
        resolve_reply(&self.canonical(kind), &address)
    }

    fn check_party(&self, token: &PlayerTokenDto) -> Result<(), ListenerError> {
        if token.party_id == self.party.party_id {
            Ok(())
        } else {
            Err(ListenerError::WrongParty(token.party_id))
        }
    }

    fn publish<T: Serialize>(&self, topic: &str, value: &T) -> Result<(), ListenerError> {
        let txt = serde_json::to_string(value).map_err(ListenerError::Serialization)?;
        self.bus
            .publish(topic, Arc::from(txt))
            .map_err(ListenerError::Bus)
    }
}

/// Starts the listeners one after another, each subscribed and running
/// before the next one starts.
pub async fn start_listeners(ctx: ListenerContext) -> Result<Vec<JoinHandle<()>>, BusError> {
    let ctx = Arc::new(ctx);
    let mut tasks = Vec::with_capacity(LISTENER_ORDER.len());

    for kind in LISTENER_ORDER {
        let topic = ctx.topics.request(kind);
        let subscription = ctx.bus.subscribe(&topic)?;
        let (ready_tx, ready_rx) = oneshot::channel();

        let span = info_span!("listener", topic = %topic);
        tasks.push(tokio::spawn(
            listen(kind, subscription, ctx.clone(), ready_tx).instrument(span),
        ));

        ready_rx.await.map_err(|_| BusError::Closed)?;
        info!(%topic, "listener ready");
    }

    Ok(tasks)
}

async fn listen(
    kind: RequestKind,
    mut subscription: Subscription,
    ctx: Arc<ListenerContext>,
    ready: oneshot::Sender<()>,
) {
    let _ = ready.send(());
    let mut throttle = Throttle::new();

    while let Some(delivery) = subscription.recv().await {
        match handle_request(kind, &delivery.payload, &ctx, &mut throttle).await {
            Ok(()) => {}
            Err(ListenerError::PartyClosed) => {
                info!("party closed; listener stopping");
                return;
            }
            Err(e) => report(kind, &ctx, e, &mut throttle),
        }
    }

    debug!("subscription ended; listener stopping");
}

async fn handle_request(
    kind: RequestKind,
    payload: &str,
    ctx: &ListenerContext,
    throttle: &mut Throttle,
) -> Result<(), ListenerError> {
    let message = InboundMessage::decode(kind, payload).map_err(ListenerError::Decode)?;

    match message {
        InboundMessage::AddPlayer(token) => add_player(ctx, token).await,
        InboundMessage::ChangeState { token, desired } => change_state(ctx, token, desired).await,
        InboundMessage::Sync(token) => sync(ctx, token).await,
        InboundMessage::Input { player_id, input } => {
            submit_input(ctx, player_id, input, throttle)
        }
        InboundMessage::Error(envelope) => {
            // Our own error replies can land on a topic we listen on.
            debug!(error = %envelope.error_message, "ignoring error envelope");
            Ok(())
        }
    }
}

async fn add_player(ctx: &ListenerContext, token: PlayerTokenDto) -> Result<(), ListenerError> {
    ctx.check_party(&token)?;

    let record = ctx
        .players
        .get_player(token.client_id)
        .await
        .map_err(ListenerError::Registry)?;

    let outcome = ctx.party.add_player(Player::new(record.uuid, record.name)).await?;
    if outcome.result.is_err() {
        debug!(player_id = %token.client_id, "re-sending party to existing player");
    }

    let topic = ctx.reply_topic(RequestKind::AddPlayer, &token);
    ctx.publish(&topic, &PartyDto::from(&outcome.party))?;

    // Push everyone's state right away instead of waiting for the next tick.
    ctx.party.broadcast().await?;
    Ok(())
}

async fn change_state(
    ctx: &ListenerContext,
    token: PlayerTokenDto,
    desired: PartyState,
) -> Result<(), ListenerError> {
    let change = ctx.party.change_state(desired).await?;
    let topic = ctx.reply_topic(RequestKind::ChangeState, &token);
    ctx.publish(&topic, &StateChangeAckDto::new(ctx.party.party_id, change))
}

async fn sync(ctx: &ListenerContext, token: PlayerTokenDto) -> Result<(), ListenerError> {
    ctx.check_party(&token)?;

    let snapshot = ctx
        .party
        .sync_for(token.client_id)
        .await?
        .ok_or(ListenerError::NotInParty(token.client_id))?;

    let topic = ctx.reply_topic(RequestKind::Sync, &token);
    ctx.publish(&topic, &SyncPayloadDto::from(&snapshot))
}

fn submit_input(
    ctx: &ListenerContext,
    player_id: Uuid,
    input: PlayerInput,
    throttle: &mut Throttle,
) -> Result<(), ListenerError> {
    let Some(input) = input.sanitized() else {
        if should_log(&mut throttle.last_invalid_input) {
            warn!(%player_id, "invalid input values (NaN/inf); dropping");
        }
        return Ok(());
    };

    match ctx.party.submit_input(player_id, input) {
        Ok(()) => Ok(()),
        Err(CommandError::Full) => {
            if should_log(&mut throttle.last_input_full) {
                warn!(%player_id, "party command queue full; dropping input");
            }
            Ok(())
        }
        Err(CommandError::Closed) => Err(ListenerError::PartyClosed),
    }
}

fn report(kind: RequestKind, ctx: &ListenerContext, err: ListenerError, throttle: &mut Throttle) {
    if let ListenerError::Registry(_) = err {
        warn!(error = %err, "dropping request");
        return;
    }
    if !err.is_reportable() {
        error!(error = %err, "request failed");
        return;
    }

    // Inputs have no reply topic.
    if kind == RequestKind::Input {
        if should_log(&mut throttle.last_invalid_input) {
            warn!(error = %err, "dropping input");
        }
        return;
    }

    warn!(error = %err, "request rejected");
    let envelope = ErrorEnvelope {
        error_message: err.to_string(),
    };
    if let Err(e) = ctx.publish(&ctx.canonical(kind), &envelope) {
        error!(error = %e, "failed to publish error envelope");
    }
}

struct Throttle {
    last_invalid_input: Instant,
    last_input_full: Instant,
}

impl Throttle {
    fn new() -> Self {
        let now = Instant::now() - LOG_THROTTLE;
        Self {
            last_invalid_input: now,
            last_input_full: now,
        }
    }
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tuning::{CarTuning, TrackTuning};
    use crate::domain::{CircuitConfig, Party, Track, Vec2};
    use crate::interface_adapters::bus::TopicExchange;
    use crate::interface_adapters::clients::MemoryRegistry;
    use crate::interface_adapters::publisher::BusSyncPublisher;
    use crate::use_cases::{SimulationSettings, spawn_party};
    use serde_json::{Value, json};

    struct Harness {
        bus: Arc<TopicExchange>,
        party: PartyHandle,
        player: Uuid,
    }

    impl Harness {
        async fn start() -> Self {
            let bus = Arc::new(TopicExchange::new(256));
            let player = Uuid::new_v4();
            let registry = Arc::new(MemoryRegistry::new().with_player(player, "ana"));

            let mut points: Vec<Vec2> = (0..200).map(|i| Vec2::new(i as f64 * 10.0, 0.0)).collect();
            points.push(points[0]);
            let party = Party::new(
                Uuid::new_v4(),
                "cup",
                player,
                CircuitConfig {
                    seed: 0,
                    min_point: 50,
                    max_point: 100,
                    x_size: 4000.0,
                    y_size: 4000.0,
                },
                Track::new(points),
            );
            let publisher = Arc::new(BusSyncPublisher::new(bus.clone(), party.uuid));
            let settings = SimulationSettings {
                tick_interval: Duration::from_millis(10),
                end_grace: Duration::from_millis(10),
                command_capacity: 64,
                car: CarTuning::default(),
                track: TrackTuning::default(),
            };
            let (handle, _task) = spawn_party(party, settings, publisher);

            start_listeners(ListenerContext::new(bus.clone(), handle.clone(), registry))
                .await
                .expect("listeners start");

            Self {
                bus,
                party: handle,
                player,
            }
        }

        fn party_id(&self) -> Uuid {
            self.party.party_id
        }

        fn subscribe(&self, topic: String) -> Subscription {
            self.bus.subscribe(&topic).expect("subscribe")
        }

        fn send(&self, kind: &str, payload: Value) {
            self.bus
                .publish(
                    &format!("party.{}.{kind}", self.party_id()),
                    Arc::from(payload.to_string()),
                )
                .expect("publish");
        }

        fn token(&self, client: Uuid) -> Value {
            json!({ "clientId": client, "partyId": self.party_id() })
        }
    }

    async fn next_json(sub: &mut Subscription) -> Value {
        let delivery = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .expect("reply in time")
            .expect("subscription open");
        serde_json::from_str(&delivery.payload).expect("json payload")
    }

    #[tokio::test]
    async fn when_registered_player_joins_then_party_sent_on_map_topic() {
        let h = Harness::start().await;
        let mut map = h.subscribe(format!("party.{}.map.{}", h.party_id(), h.player));
        let mut sync = h.subscribe(format!("party.{}.sync.{}", h.party_id(), h.player));

        h.send("addPlayer", h.token(h.player));

        let party = next_json(&mut map).await;
        assert_eq!(party["uuid"], json!(h.party_id()));
        assert_eq!(party["players"][0]["name"], "ana");
        assert_eq!(party["track"].as_array().map(Vec::len), Some(201));

        let payload = next_json(&mut sync).await;
        assert_eq!(payload["mainActor"]["actor"]["name"], "ana");
    }

    #[tokio::test]
    async fn when_unknown_player_joins_then_request_dropped_silently() {
        let h = Harness::start().await;
        let stranger = Uuid::new_v4();
        let mut canonical = h.subscribe(format!("party.{}.map", h.party_id()));
        let mut map = h.subscribe(format!("party.{}.map.{}", h.party_id(), h.player));

        h.send("addPlayer", h.token(stranger));
        // Requests are served in order, so this reply means the first one is done.
        h.send("addPlayer", h.token(h.player));
        let party = next_json(&mut map).await;

        assert_eq!(party["players"].as_array().map(Vec::len), Some(1));
        assert!(canonical.receiver.try_recv().is_err());
        let snapshot = h.party.sync_for(stranger).await.expect("party alive");
        assert!(snapshot.is_none());
    }

    #[tokio::test]
    async fn when_reply_to_given_then_reply_uses_it_verbatim() {
        let h = Harness::start().await;
        let mut inbox = h.subscribe("clients.inbox.ana".to_string());

        let mut token = h.token(h.player);
        token["replyTo"] = json!("clients.inbox.ana");
        h.send("addPlayer", token);

        let party = next_json(&mut inbox).await;
        assert_eq!(party["name"], "cup");
    }

    #[tokio::test]
    async fn when_state_change_requested_then_ack_sent_to_requester() {
        let h = Harness::start().await;
        let requester = Uuid::new_v4();
        let mut acks = h.subscribe(format!("party.{}.state.{requester}", h.party_id()));

        h.send(
            "state",
            json!({ "playerToken": h.token(requester), "desiredState": 2 }),
        );

        let ack = next_json(&mut acks).await;
        assert_eq!(
            ack,
            json!({ "partyId": h.party_id(), "desiredState": 2, "newState": 2, "message": "OK" })
        );
    }

    #[tokio::test]
    async fn when_state_token_names_other_party_then_still_applied() {
        let h = Harness::start().await;
        let requester = Uuid::new_v4();
        let mut acks = h.subscribe(format!("party.{}.state.{requester}", h.party_id()));

        h.send(
            "state",
            json!({
                "playerToken": { "clientId": requester, "partyId": Uuid::new_v4() },
                "desiredState": 1
            }),
        );

        let ack = next_json(&mut acks).await;
        assert_eq!(ack["newState"], 1);
        assert_eq!(ack["message"], "OK");

        h.party
            .add_player(Player::new(h.player, "ana"))
            .await
            .expect("party alive");
        let snapshot = h
            .party
            .sync_for(h.player)
            .await
            .expect("party alive")
            .expect("in roster");
        assert_eq!(snapshot.state, PartyState::Run);
    }

    #[tokio::test]
    async fn when_payload_malformed_then_error_and_listener_keeps_serving() {
        let h = Harness::start().await;
        h.party
            .add_player(Player::new(h.player, "ana"))
            .await
            .expect("party alive");

        let mut canonical = h.subscribe(format!("party.{}.sync", h.party_id()));
        h.bus
            .publish(&format!("party.{}.sync", h.party_id()), Arc::from("{oops"))
            .expect("publish");

        // The listener sees the garbage first, then its own error envelope.
        let _garbage = canonical.recv().await.expect("garbage");
        let reply = next_json(&mut canonical).await;
        assert!(reply["errorMessage"].as_str().is_some());

        let mut personal = h.subscribe(format!("party.{}.sync.{}", h.party_id(), h.player));
        h.send("sync", h.token(h.player));
        let payload = next_json(&mut personal).await;
        assert!(payload["partyState"].is_number());
    }

    #[tokio::test]
    async fn when_token_names_other_party_then_rejected() {
        let h = Harness::start().await;
        let mut errors = h.subscribe(format!("party.{}.map", h.party_id()));

        h.send(
            "addPlayer",
            json!({ "clientId": h.player, "partyId": Uuid::new_v4() }),
        );

        let reply = next_json(&mut errors).await;
        assert!(
            reply["errorMessage"]
                .as_str()
                .is_some_and(|m| m.contains("request addressed to party"))
        );
    }

    #[tokio::test]
    async fn when_input_received_then_stored_for_player() {
        let h = Harness::start().await;
        h.party
            .add_player(Player::new(h.player, "ana"))
            .await
            .expect("party alive");

        h.send(
            "input",
            json!({ "acceleration": 4.0, "turning": 0.0, "messageNumber": 3, "playerUuid": h.player }),
        );

        let mut stored = None;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let snapshot = h
                .party
                .sync_for(h.player)
                .await
                .expect("party alive")
                .expect("in roster");
            if snapshot.main.input.message_number == 3 {
                stored = Some(snapshot.main.input);
                break;
            }
        }
        let input = stored.expect("input reached the party");
        // Clamped into [-1, 1].
        assert_eq!(input.acceleration, 1.0);
    }
}
