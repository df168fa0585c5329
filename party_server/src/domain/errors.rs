// Domain-level errors for party workflows.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackError {
    /// `min_point` is larger than `max_point`.
    InvalidPointRange { min_point: usize, max_point: usize },
    /// An extent is negative or not finite.
    InvalidExtent,
}

impl fmt::Display for TrackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackError::InvalidPointRange {
                min_point,
                max_point,
            } => write!(f, "invalid point range: min {min_point} > max {max_point}"),
            TrackError::InvalidExtent => write!(f, "circuit extents must be finite and positive"),
        }
    }
}

impl std::error::Error for TrackError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartyError {
    PlayerAlreadyInParty,
    PlayerNotInParty,
}

impl fmt::Display for PartyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartyError::PlayerAlreadyInParty => write!(f, "player already in party"),
            PartyError::PlayerNotInParty => write!(f, "player not in party"),
        }
    }
}

impl std::error::Error for PartyError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    NotFound,
    Unavailable,
    Decode(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::NotFound => write!(f, "record not found"),
            RegistryError::Unavailable => write!(f, "registry unavailable"),
            RegistryError::Decode(reason) => write!(f, "invalid registry record: {reason}"),
        }
    }
}

impl std::error::Error for RegistryError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    Closed,
    InvalidTopic(String),
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::Closed => write!(f, "message bus closed"),
            BusError::InvalidTopic(topic) => write!(f, "invalid topic: {topic:?}"),
        }
    }
}

impl std::error::Error for BusError {}
