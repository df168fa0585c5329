use super::types::{AddPlayerOutcome, PartyCommand, PartySnapshot, SimulationSettings};
use crate::domain::ports::SyncPublisher;
use crate::domain::{BusError, Party, PartyError, TickAction};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

// Share of the target tick rate below which the monitor complains.
const TICK_RATE_TOLERANCE: f64 = 0.95;

/// Owns the party state: serves commands and drives the fixed-rate loop
/// until the party reaches END.
pub async fn party_task(
    mut party: Party,
    mut commands: mpsc::Receiver<PartyCommand>,
    publisher: Arc<dyn SyncPublisher>,
    settings: SimulationSettings,
) -> Result<(), BusError> {
    let mut interval = tokio::time::interval(settings.tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_tick = Instant::now();
    let mut monitor = TickMonitor::new(settings.target_tick_rate(), last_tick);
    let mut commands_open = true;

    info!(
        players = party.player_count(),
        track_points = party.track.len(),
        tick_rate = settings.target_tick_rate(),
        "party simulation started"
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Instant::now();
                let dt = now.duration_since(last_tick).as_secs_f64();
                last_tick = now;

                match party.state().tick_action() {
                    TickAction::SnapToStart => party.snap_to_start(&settings.track),
                    TickAction::Simulate => party.simulate(dt, &settings.car, &settings.track),
                    TickAction::Hold => {}
                    TickAction::Finish => {
                        broadcast(&party, publisher.as_ref())?;
                        info!(players = party.player_count(), "party ended; stopping simulation");
                        tokio::time::sleep(settings.end_grace).await;
                        return Ok(());
                    }
                }

                broadcast(&party, publisher.as_ref())?;
                monitor.record(now);
            }
            command = commands.recv(), if commands_open => {
                match command {
                    Some(command) => handle_command(&mut party, command, publisher.as_ref())?,
                    None => {
                        // Nothing can reach the party any more; keep running until END.
                        debug!("all party handles dropped");
                        commands_open = false;
                    }
                }
            }
        }
    }
}

fn handle_command(
    party: &mut Party,
    command: PartyCommand,
    publisher: &dyn SyncPublisher,
) -> Result<(), BusError> {
    match command {
        PartyCommand::AddPlayer { player, reply } => {
            let player_id = player.uuid;
            let result = party.add_player(player);
            match &result {
                Ok(()) => info!(%player_id, players = party.player_count(), "player joined"),
                Err(PartyError::PlayerAlreadyInParty) => {
                    warn!(%player_id, "player already in party")
                }
                Err(e) => warn!(%player_id, error = %e, "failed to add player"),
            }
            let _ = reply.send(AddPlayerOutcome {
                party: PartySnapshot::from(&*party),
                result,
            });
        }
        PartyCommand::ChangeState { desired, reply } => {
            let change = party.change_state(desired);
            info!(from = %change.previous, to = %change.current, "party state changed");
            let _ = reply.send(change);
        }
        PartyCommand::Sync { player_id, reply } => {
            let _ = reply.send(party.sync_snapshot_for(&player_id));
        }
        PartyCommand::Input { player_id, input } => {
            if party.set_input(&player_id, input).is_err() {
                debug!(%player_id, "input for player not in party; dropping");
            }
        }
        PartyCommand::Broadcast => {
            // The END tick sends the last payload itself.
            if party.state().is_terminal() {
                debug!("party ended; skipping forced broadcast");
            } else {
                broadcast(party, publisher)?;
            }
        }
    }
    Ok(())
}

fn broadcast(party: &Party, publisher: &dyn SyncPublisher) -> Result<(), BusError> {
    for snapshot in party.sync_snapshots() {
        match publisher.publish_snapshot(party.uuid, &snapshot) {
            Ok(()) => {}
            Err(BusError::Closed) => {
                tracing::error!("message bus closed; stopping party");
                return Err(BusError::Closed);
            }
            Err(e) => warn!(player_id = %snapshot.main.uuid, error = %e, "failed to publish sync"),
        }
    }
    Ok(())
}

// Counts ticks per one-second window and warns when the loop falls behind.
struct TickMonitor {
    target: u32,
    window_start: Instant,
    ticks: u32,
}

impl TickMonitor {
    fn new(target: u32, now: Instant) -> Self {
        Self {
            target,
            window_start: now,
            ticks: 0,
        }
    }

    fn record(&mut self, now: Instant) {
        self.ticks += 1;
        if now.duration_since(self.window_start) < Duration::from_secs(1) {
            return;
        }
        if f64::from(self.ticks) < f64::from(self.target) * TICK_RATE_TOLERANCE {
            warn!(ticks = self.ticks, target = self.target, "tick rate too low");
        }
        self.ticks = 0;
        self.window_start = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tuning::{CarTuning, TrackTuning};
    use crate::domain::{
        CircuitConfig, PartyState, Player, PlayerInput, SyncSnapshot, Track, Vec2,
    };
    use crate::use_cases::party::spawn_party;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<SyncSnapshot>>,
    }

    impl RecordingPublisher {
        fn count_in(&self, state: PartyState) -> usize {
            self.sent
                .lock()
                .expect("publisher lock")
                .iter()
                .filter(|s| s.state == state)
                .count()
        }

        fn total(&self) -> usize {
            self.sent.lock().expect("publisher lock").len()
        }
    }

    impl SyncPublisher for RecordingPublisher {
        fn publish_snapshot(&self, _party_id: Uuid, snapshot: &SyncSnapshot) -> Result<(), BusError> {
            self.sent.lock().expect("publisher lock").push(snapshot.clone());
            Ok(())
        }
    }

    struct ClosedPublisher;

    impl SyncPublisher for ClosedPublisher {
        fn publish_snapshot(&self, _party_id: Uuid, _snapshot: &SyncSnapshot) -> Result<(), BusError> {
            Err(BusError::Closed)
        }
    }

    fn settings(tick_interval: Duration) -> SimulationSettings {
        SimulationSettings {
            tick_interval,
            end_grace: Duration::from_secs(1),
            command_capacity: 64,
            car: CarTuning::default(),
            track: TrackTuning::default(),
        }
    }

    fn straight_party() -> Party {
        let mut points: Vec<Vec2> = (0..400).map(|i| Vec2::new(i as f64 * 10.0, 0.0)).collect();
        points.push(points[0]);
        Party::new(
            Uuid::new_v4(),
            "test",
            Uuid::new_v4(),
            CircuitConfig {
                seed: 0,
                min_point: 50,
                max_point: 100,
                x_size: 4000.0,
                y_size: 4000.0,
            },
            Track::new(points),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn when_end_reached_then_one_final_broadcast_and_task_stops() {
        let publisher = Arc::new(RecordingPublisher::default());
        let mut party = straight_party();
        party.add_player(Player::new(Uuid::new_v4(), "a")).expect("add");
        party.add_player(Player::new(Uuid::new_v4(), "b")).expect("add");

        let (handle, task) = spawn_party(
            party,
            settings(Duration::from_millis(8)),
            publisher.clone(),
        );

        let change = handle.change_state(PartyState::End).await.expect("task alive");
        assert_eq!(change.current, PartyState::End);

        let result = task.await.expect("task joined");
        assert!(result.is_ok());
        // One snapshot per player for the single END broadcast.
        assert_eq!(publisher.count_in(PartyState::End), 2);
        assert!(handle.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn when_player_added_in_lobby_then_snapped_to_start() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (handle, _task) = spawn_party(
            straight_party(),
            settings(Duration::from_millis(8)),
            publisher,
        );

        let id = Uuid::new_v4();
        let mut player = Player::new(id, "racer");
        player.position.position = Vec2::new(123.0, 456.0);
        player.position.angle = 2.0;
        let outcome = handle.add_player(player).await.expect("task alive");
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.party.players.len(), 1);

        tokio::time::sleep(Duration::from_millis(50)).await;

        let snapshot = handle.sync_for(id).await.expect("task alive").expect("in roster");
        assert_eq!(snapshot.main.position.position, Vec2::new(0.0, 0.0));
        assert_eq!(snapshot.main.position.angle, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn when_running_with_full_throttle_then_speed_rises_within_bounds() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (handle, _task) = spawn_party(
            straight_party(),
            settings(Duration::from_secs_f64(1.0 / 120.0)),
            publisher,
        );

        let id = Uuid::new_v4();
        handle
            .add_player(Player::new(id, "racer"))
            .await
            .expect("task alive");
        tokio::time::sleep(Duration::from_millis(20)).await;

        handle
            .submit_input(
                id,
                PlayerInput {
                    acceleration: 1.0,
                    ..PlayerInput::default()
                },
            )
            .expect("queue has room");
        handle.change_state(PartyState::Run).await.expect("task alive");
        tokio::time::sleep(Duration::from_secs(1)).await;

        let snapshot = handle.sync_for(id).await.expect("task alive").expect("in roster");
        assert_eq!(snapshot.state, PartyState::Run);
        assert!(snapshot.main.position.speed > 300.0);
        assert!(snapshot.main.position.speed <= 500.0);
        assert!(snapshot.main.position.position.x > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn when_duplicate_player_added_then_party_still_returned() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (handle, _task) = spawn_party(
            straight_party(),
            settings(Duration::from_secs(3600)),
            publisher,
        );

        let id = Uuid::new_v4();
        handle.add_player(Player::new(id, "one")).await.expect("task alive");
        let outcome = handle
            .add_player(Player::new(id, "two"))
            .await
            .expect("task alive");

        assert_eq!(outcome.result, Err(PartyError::PlayerAlreadyInParty));
        assert_eq!(outcome.party.players.len(), 1);
        assert_eq!(outcome.party.players[0].name, "one");
    }

    #[tokio::test(start_paused = true)]
    async fn when_broadcast_forced_then_every_player_gets_a_snapshot() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (handle, _task) = spawn_party(
            straight_party(),
            settings(Duration::from_secs(3600)),
            publisher.clone(),
        );

        handle
            .add_player(Player::new(Uuid::new_v4(), "a"))
            .await
            .expect("task alive");
        handle
            .add_player(Player::new(Uuid::new_v4(), "b"))
            .await
            .expect("task alive");
        let before = publisher.total();

        handle.broadcast().await.expect("task alive");
        // Round-trip through the task so the broadcast has been handled.
        let _ = handle.sync_for(Uuid::new_v4()).await.expect("task alive");

        assert_eq!(publisher.total(), before + 2);
    }

    #[tokio::test(start_paused = true)]
    async fn when_broadcast_forced_after_end_then_only_final_tick_publishes() {
        let publisher = Arc::new(RecordingPublisher::default());
        let mut party = straight_party();
        party.add_player(Player::new(Uuid::new_v4(), "a")).expect("add");
        party.add_player(Player::new(Uuid::new_v4(), "b")).expect("add");

        let (handle, task) = spawn_party(
            party,
            settings(Duration::from_secs(3600)),
            publisher.clone(),
        );
        // Let the immediate first tick go out; the next one is an hour away.
        while publisher.total() < 2 {
            tokio::task::yield_now().await;
        }

        handle.change_state(PartyState::End).await.expect("task alive");
        handle.broadcast().await.expect("task alive");
        let _ = handle.sync_for(Uuid::new_v4()).await.expect("task alive");
        assert_eq!(publisher.count_in(PartyState::End), 0);

        let result = task.await.expect("task joined");
        assert!(result.is_ok());
        assert_eq!(publisher.count_in(PartyState::End), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn when_sync_requested_for_stranger_then_none() {
        let (handle, _task) = spawn_party(
            straight_party(),
            settings(Duration::from_secs(3600)),
            Arc::new(RecordingPublisher::default()),
        );
        let snapshot = handle.sync_for(Uuid::new_v4()).await.expect("task alive");
        assert!(snapshot.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn when_bus_closed_then_task_stops_with_error() {
        let mut party = straight_party();
        party.add_player(Player::new(Uuid::new_v4(), "a")).expect("add");
        let (_handle, task) = spawn_party(
            party,
            settings(Duration::from_millis(8)),
            Arc::new(ClosedPublisher),
        );

        let result = task.await.expect("task joined");
        assert_eq!(result, Err(BusError::Closed));
    }
}
