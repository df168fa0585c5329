// Domain layer: track generation, car physics and party rules.

pub mod errors;
pub mod geometry;
pub mod lifecycle;
pub mod party;
pub mod physics;
pub mod ports;
pub mod progress;
pub mod spline;
pub mod track;
pub mod tuning;

pub use errors::{BusError, PartyError, RegistryError, TrackError};
pub use geometry::Vec2;
pub use lifecycle::{PartyState, StateChange, TickAction};
pub use party::{Competitor, Party, Player, PlayerInput, PlayerPosition, SyncSnapshot};
pub use track::{CircuitConfig, Track, TurnPoint};
