// Use-case level inputs/outputs for the party task.

use crate::domain::tuning::{CarTuning, TrackTuning};
use crate::domain::{
    CircuitConfig, Party, PartyError, PartyState, Player, PlayerInput, StateChange, SyncSnapshot,
    Track,
};
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Requests served by the task that owns the party state.
#[derive(Debug)]
pub enum PartyCommand {
    AddPlayer {
        player: Player,
        reply: oneshot::Sender<AddPlayerOutcome>,
    },
    ChangeState {
        desired: PartyState,
        reply: oneshot::Sender<StateChange>,
    },
    Sync {
        player_id: Uuid,
        reply: oneshot::Sender<Option<SyncSnapshot>>,
    },
    Input {
        player_id: Uuid,
        input: PlayerInput,
    },
    /// Push the sync payload to every player now instead of on the next tick.
    Broadcast,
}

/// Result of an add-player request. The party is returned even when the
/// player was already in the roster.
#[derive(Debug, Clone)]
pub struct AddPlayerOutcome {
    pub party: PartySnapshot,
    pub result: Result<(), PartyError>,
}

/// Full copy of the party handed out to the adapters.
#[derive(Debug, Clone)]
pub struct PartySnapshot {
    pub uuid: Uuid,
    pub name: String,
    pub state: PartyState,
    pub circuit: CircuitConfig,
    pub track: Track,
    pub players: Vec<Player>,
}

impl From<&Party> for PartySnapshot {
    fn from(party: &Party) -> Self {
        Self {
            uuid: party.uuid,
            name: party.name.clone(),
            state: party.state(),
            circuit: party.circuit.clone(),
            track: party.track.clone(),
            players: party.players().cloned().collect(),
        }
    }
}

/// Failure to hand a command to the party task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// The party task has stopped.
    Closed,
    /// The command queue is full; the command was dropped.
    Full,
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Closed => write!(f, "party task closed"),
            CommandError::Full => write!(f, "party command queue full"),
        }
    }
}

impl std::error::Error for CommandError {}

/// Shared configuration for the party task.
#[derive(Debug, Clone)]
pub struct SimulationSettings {
    /// Fixed tick interval for the simulation loop.
    pub tick_interval: Duration,
    /// How long the task lingers after the final END broadcast.
    pub end_grace: Duration,
    /// Capacity for inbound party commands.
    pub command_capacity: usize,
    pub car: CarTuning,
    pub track: TrackTuning,
}

impl SimulationSettings {
    pub fn target_tick_rate(&self) -> u32 {
        let secs = self.tick_interval.as_secs_f64();
        if secs > 0.0 {
            (1.0 / secs).round() as u32
        } else {
            0
        }
    }
}
