//! Manager run state

use std::fmt;

/// Lifecycle of a manager; it moves forward only and is never restarted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// Constructed, `start` not yet called
    Created,
    /// Cache is syncing
    Starting,
    /// Runnables are running
    Running,
    Stopped,
}

impl ManagerState {
    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(self, next: ManagerState) -> bool {
        use ManagerState::*;
        matches!(
            (self, next),
            (Created, Starting) | (Starting, Running) | (Starting, Stopped) | (Running, Stopped)
        )
    }

    /// Running or stopped; the manager will not start anything deferred anymore
    pub fn is_settled(self) -> bool {
        matches!(self, ManagerState::Running | ManagerState::Stopped)
    }
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ManagerState::Created => "created",
            ManagerState::Starting => "starting",
            ManagerState::Running => "running",
            ManagerState::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}
