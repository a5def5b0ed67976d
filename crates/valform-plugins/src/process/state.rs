//! Lifecycle of a single formatter process.

use std::fmt;

use tracing::{trace, warn};

use super::PROCESS_TARGET;

/// Phase of one formatter process.
///
/// The legal transitions are `NotStarted → Starting → Running`, then
/// `Running → Finished` on a normal exit or `Running → Killed` when the run
/// timeout fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// No process exists yet.
    NotStarted,
    /// The process has been requested from the OS.
    Starting,
    /// The process is running and its pipes are being drained.
    Running,
    /// The process exited on its own.
    Finished,
    /// The process was killed after exceeding its run timeout.
    Killed,
}

impl ProcessState {
    /// Returns whether `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Starting)
                | (Self::Starting, Self::Running)
                | (Self::Running, Self::Finished | Self::Killed)
        )
    }

    /// Returns `true` once the process is gone.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Killed)
    }

    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Killed => "killed",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the state of one run and traces every transition.
#[derive(Debug)]
pub(crate) struct Lifecycle<'a> {
    command: &'a str,
    state: ProcessState,
}

impl<'a> Lifecycle<'a> {
    pub(crate) const fn new(command: &'a str) -> Self {
        Self {
            command,
            state: ProcessState::NotStarted,
        }
    }

    pub(crate) fn advance(&mut self, next: ProcessState) {
        if !self.state.can_advance_to(next) {
            warn!(
                target: PROCESS_TARGET,
                command = self.command,
                from = %self.state,
                to = %next,
                "unexpected process state transition"
            );
        }
        trace!(
            target: PROCESS_TARGET,
            command = self.command,
            from = %self.state,
            to = %next,
            "process state transition"
        );
        self.state = next;
    }

    pub(crate) const fn state(&self) -> ProcessState {
        self.state
    }
}
