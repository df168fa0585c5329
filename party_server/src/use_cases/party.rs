// Party task spawning and the command facade used by the listeners.

use crate::domain::ports::SyncPublisher;
use crate::domain::{BusError, Party, PartyState, Player, PlayerInput, StateChange, SyncSnapshot};
use crate::use_cases::simulation::party_task;
use crate::use_cases::{AddPlayerOutcome, CommandError, PartyCommand, SimulationSettings};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

/// Cloneable sender side of the party task.
#[derive(Debug, Clone)]
pub struct PartyHandle {
    /// Identifier of the party the task owns.
    pub party_id: Uuid,
    commands: mpsc::Sender<PartyCommand>,
}

impl PartyHandle {
    pub fn new(party_id: Uuid, commands: mpsc::Sender<PartyCommand>) -> Self {
        Self { party_id, commands }
    }

    pub async fn add_player(&self, player: Player) -> Result<AddPlayerOutcome, CommandError> {
        let (reply, rx) = oneshot::channel();
        self.send(PartyCommand::AddPlayer { player, reply }).await?;
        rx.await.map_err(|_| CommandError::Closed)
    }

    pub async fn change_state(&self, desired: PartyState) -> Result<StateChange, CommandError> {
        let (reply, rx) = oneshot::channel();
        self.send(PartyCommand::ChangeState { desired, reply }).await?;
        rx.await.map_err(|_| CommandError::Closed)
    }

    /// Current sync view for one player; `None` when they are not in the roster.
    pub async fn sync_for(&self, player_id: Uuid) -> Result<Option<SyncSnapshot>, CommandError> {
        let (reply, rx) = oneshot::channel();
        self.send(PartyCommand::Sync { player_id, reply }).await?;
        rx.await.map_err(|_| CommandError::Closed)
    }

    pub async fn broadcast(&self) -> Result<(), CommandError> {
        self.send(PartyCommand::Broadcast).await
    }

    /// Never waits: inputs are dropped when the queue is full.
    pub fn submit_input(&self, player_id: Uuid, input: PlayerInput) -> Result<(), CommandError> {
        match self
            .commands
            .try_send(PartyCommand::Input { player_id, input })
        {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(CommandError::Full),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(CommandError::Closed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    async fn send(&self, command: PartyCommand) -> Result<(), CommandError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CommandError::Closed)
    }
}

/// A party whose task has not started ticking yet. Commands sent through
/// its handle queue up until [`PendingParty::start`].
pub struct PendingParty {
    party: Party,
    commands: mpsc::Receiver<PartyCommand>,
    publisher: Arc<dyn SyncPublisher>,
    settings: SimulationSettings,
}

impl PendingParty {
    /// Spawns the task that owns the party and runs its simulation loop.
    ///
    /// The join handle resolves once the party has reached END and the grace
    /// period elapsed, or when the bus went away.
    pub fn start(self) -> JoinHandle<Result<(), BusError>> {
        let span = tracing::info_span!("party", party_id = %self.party.uuid);
        tokio::spawn(
            party_task(self.party, self.commands, self.publisher, self.settings).instrument(span),
        )
    }
}

pub fn prepare_party(
    party: Party,
    settings: SimulationSettings,
    publisher: Arc<dyn SyncPublisher>,
) -> (PartyHandle, PendingParty) {
    let (commands_tx, commands_rx) = mpsc::channel::<PartyCommand>(settings.command_capacity);
    let handle = PartyHandle::new(party.uuid, commands_tx);
    let pending = PendingParty {
        party,
        commands: commands_rx,
        publisher,
        settings,
    };
    (handle, pending)
}

pub fn spawn_party(
    party: Party,
    settings: SimulationSettings,
    publisher: Arc<dyn SyncPublisher>,
) -> (PartyHandle, JoinHandle<Result<(), BusError>>) {
    let (handle, pending) = prepare_party(party, settings, publisher);
    (handle, pending.start())
}
