//! Operation lifecycle state machine.

use crate::error::{Error, Result};

/// Lifecycle of one coordinator run
///
/// ```text
/// Idle -> Running -> { Cancelling | Failed | Completed }
/// ```
///
/// The three right-hand states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationState {
    /// Nothing has been started yet
    #[default]
    Idle,
    /// Items are being processed
    Running,
    /// The caller asked to stop; the run is winding down
    Cancelling,
    /// An item failed and the queue was halted
    Failed,
    /// Every item finished successfully
    Completed,
}

impl OperationState {
    /// Check if no further transitions are possible
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelling | Self::Failed | Self::Completed)
    }

    /// Check whether moving to `next` is a legal transition
    #[must_use]
    pub fn can_transition_to(self, next: OperationState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::Cancelling)
                | (Self::Running, Self::Failed)
                | (Self::Running, Self::Completed)
        )
    }

    /// Move to `next`, rejecting illegal transitions
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the transition is not allowed.
    pub fn transition(&mut self, next: OperationState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidState {
                from: *self,
                to: next,
            });
        }
        tracing::debug!(from = %self, to = %next, "operation state transition");
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Cancelling => write!(f, "cancelling"),
            Self::Failed => write!(f, "failed"),
            Self::Completed => write!(f, "completed"),
        }
    }
}
