// Party aggregate: track, roster and lifecycle state.

use crate::domain::errors::PartyError;
use crate::domain::geometry::Vec2;
use crate::domain::lifecycle::{PartyState, StateChange};
use crate::domain::physics;
use crate::domain::progress::compute_closest;
use crate::domain::track::{CircuitConfig, Track};
use crate::domain::tuning::{CarTuning, TrackTuning};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayerPosition {
    pub speed: f64,
    pub angle: f64,
    pub position: Vec2,
}

/// Latest control sample. Replaced wholesale on every input message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerInput {
    pub acceleration: f64,
    pub turning: f64,
    pub message_number: u64,
    /// RFC 3339 send time as reported by the client.
    pub timestamp: Option<String>,
}

impl PlayerInput {
    /// Rejects NaN/inf controls and clamps the rest into [-1, 1].
    pub fn sanitized(mut self) -> Option<Self> {
        if !self.acceleration.is_finite() || !self.turning.is_finite() {
            return None;
        }
        self.acceleration = self.acceleration.clamp(-1.0, 1.0);
        self.turning = self.turning.clamp(-1.0, 1.0);
        Some(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub uuid: Uuid,
    pub name: String,
    pub position: PlayerPosition,
    pub input: PlayerInput,
    /// Cursor into the track used by the progress search.
    pub progress_index: usize,
}

impl Player {
    pub fn new(uuid: Uuid, name: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
            position: PlayerPosition::default(),
            input: PlayerInput::default(),
            progress_index: 0,
        }
    }
}

/// Another racer as seen by the snapshot's recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct Competitor {
    pub uuid: Uuid,
    pub name: String,
    pub rank: u32,
    pub position: PlayerPosition,
}

/// Per-recipient view of the party sent every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSnapshot {
    pub state: PartyState,
    pub main: Player,
    pub rank: u32,
    pub competitors: Vec<Competitor>,
}

#[derive(Debug, Clone)]
pub struct Party {
    pub uuid: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub circuit: CircuitConfig,
    pub track: Track,
    state: PartyState,
    players: BTreeMap<Uuid, Player>,
}

impl Party {
    pub fn new(
        uuid: Uuid,
        name: impl Into<String>,
        owner_id: Uuid,
        circuit: CircuitConfig,
        track: Track,
    ) -> Self {
        Self {
            uuid,
            name: name.into(),
            owner_id,
            circuit,
            track,
            state: PartyState::Lobby,
            players: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> PartyState {
        self.state
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn player(&self, uuid: &Uuid) -> Option<&Player> {
        self.players.get(uuid)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn add_player(&mut self, mut player: Player) -> Result<(), PartyError> {
        if self.players.contains_key(&player.uuid) {
            return Err(PartyError::PlayerAlreadyInParty);
        }
        player.progress_index = 0;
        self.players.insert(player.uuid, player);
        Ok(())
    }

    /// Applies the requested state without checking the current one.
    pub fn change_state(&mut self, desired: PartyState) -> StateChange {
        let previous = self.state;
        self.state = desired;
        StateChange {
            desired,
            previous,
            current: self.state,
        }
    }

    pub fn set_input(&mut self, uuid: &Uuid, input: PlayerInput) -> Result<(), PartyError> {
        let player = self
            .players
            .get_mut(uuid)
            .ok_or(PartyError::PlayerNotInParty)?;
        player.input = input;
        Ok(())
    }

    /// Puts every car on the start grid and resets its progress cursor.
    pub fn snap_to_start(&mut self, tuning: &TrackTuning) {
        let Some((start, heading)) = self.track.start(tuning.start_heading_lookahead) else {
            return;
        };
        for player in self.players.values_mut() {
            physics::snap_to_start(&mut player.position, start, heading);
            player.progress_index = 0;
        }
    }

    /// One simulation step for every player: progress search, then physics.
    pub fn simulate(&mut self, dt: f64, car: &CarTuning, track_tuning: &TrackTuning) {
        for player in self.players.values_mut() {
            player.progress_index = compute_closest(
                &self.track,
                player.position.position,
                player.progress_index,
                track_tuning.search_window,
            );
            let closest = self.track.get(player.progress_index);
            physics::step(&mut player.position, &player.input, closest, dt, car);
        }
    }

    /// The sync view for one player, `None` when they are not in the roster.
    pub fn sync_snapshot_for(&self, uuid: &Uuid) -> Option<SyncSnapshot> {
        let main = self.players.get(uuid)?.clone();
        let competitors = self
            .players
            .values()
            .filter(|p| p.uuid != *uuid)
            .map(|p| Competitor {
                uuid: p.uuid,
                name: p.name.clone(),
                rank: 0,
                position: p.position,
            })
            .collect();
        Some(SyncSnapshot {
            state: self.state,
            main,
            rank: 0,
            competitors,
        })
    }

    pub fn sync_snapshots(&self) -> Vec<SyncSnapshot> {
        self.players
            .keys()
            .filter_map(|uuid| self.sync_snapshot_for(uuid))
            .collect()
    }
}
