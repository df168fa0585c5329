// Party lifecycle states and what each one does on a tick.

use std::fmt;

/// LOBBY -> RUN <-> PAUSE -> END. Requests are never checked against the
/// current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartyState {
    #[default]
    Lobby,
    Run,
    Pause,
    End,
}

/// Work the simulation loop performs for the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// Put every car on the start grid, then broadcast.
    SnapToStart,
    /// Integrate physics and progress, then broadcast.
    Simulate,
    /// Broadcast only.
    Hold,
    /// Broadcast once more and stop.
    Finish,
}

impl PartyState {
    pub fn code(self) -> i32 {
        match self {
            PartyState::Lobby => 0,
            PartyState::Run => 1,
            PartyState::Pause => 2,
            PartyState::End => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(PartyState::Lobby),
            1 => Some(PartyState::Run),
            2 => Some(PartyState::Pause),
            3 => Some(PartyState::End),
            _ => None,
        }
    }

    pub fn tick_action(self) -> TickAction {
        match self {
            PartyState::Lobby => TickAction::SnapToStart,
            PartyState::Run => TickAction::Simulate,
            PartyState::Pause => TickAction::Hold,
            PartyState::End => TickAction::Finish,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == PartyState::End
    }
}

impl fmt::Display for PartyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PartyState::Lobby => "LOBBY",
            PartyState::Run => "RUN",
            PartyState::Pause => "PAUSE",
            PartyState::End => "END",
        };
        f.write_str(name)
    }
}

/// Outcome of a transition request, echoed back to the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub desired: PartyState,
    pub previous: PartyState,
    pub current: PartyState,
}
