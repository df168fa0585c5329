// Use-case layer: the party task and its command interface.

pub mod party;
pub mod simulation;
pub mod types;

pub use party::{PartyHandle, PendingParty, prepare_party, spawn_party};
pub use types::{AddPlayerOutcome, CommandError, PartyCommand, PartySnapshot, SimulationSettings};
