//! Update state machine.

use common::{EntityId, UpdateId};
use serde::{Deserialize, Serialize};

/// The step at which an update stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailedStep {
    /// Transaction A did not commit.
    Step1,

    /// The external call failed after transaction A committed.
    ExternalCall,

    /// Transaction B did not commit.
    Step2,
}

impl FailedStep {
    /// Returns the step name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailedStep::Step1 => "step1",
            FailedStep::ExternalCall => "external_call",
            FailedStep::Step2 => "step2",
        }
    }
}

impl std::fmt::Display for FailedStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The state of a single two-phase update.
///
/// State transitions:
/// ```text
/// Idle ──► TxAOpen ──► TxACommitted ──► ExternalInFlight ──► TxBOpen ──► TxBCommitted
///  │         │                               │    │             │
///  └─────────┴──► Failed(Step1)              │    └─────────────┴──► Failed(Step2)
///                                            └──► Failed(ExternalCall)
/// ```
///
/// `Idle` fails directly when transaction A cannot be opened, and
/// `ExternalInFlight` fails with `Step2` when transaction B cannot be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum UpdateState {
    /// Nothing has happened yet.
    #[default]
    Idle,

    /// Transaction A is open.
    TxAOpen,

    /// Transaction A committed; the payload is durable.
    TxACommitted,

    /// The external call is running with no transaction open.
    ExternalInFlight,

    /// Transaction B is open.
    TxBOpen,

    /// Transaction B committed (terminal success).
    TxBCommitted,

    /// The update stopped at the given step (terminal failure).
    Failed(FailedStep),
}

impl UpdateState {
    /// Returns true if the state machine may move from `self` to `next`.
    pub fn can_transition_to(&self, next: UpdateState) -> bool {
        use UpdateState::*;

        matches!(
            (self, next),
            (Idle, TxAOpen)
                | (Idle, Failed(FailedStep::Step1))
                | (TxAOpen, TxACommitted)
                | (TxAOpen, Failed(FailedStep::Step1))
                | (TxACommitted, ExternalInFlight)
                | (ExternalInFlight, TxBOpen)
                | (ExternalInFlight, Failed(FailedStep::ExternalCall))
                | (ExternalInFlight, Failed(FailedStep::Step2))
                | (TxBOpen, TxBCommitted)
                | (TxBOpen, Failed(FailedStep::Step2))
        )
    }

    /// Returns true if a transaction is open in this state.
    pub fn holds_transaction(&self) -> bool {
        matches!(self, UpdateState::TxAOpen | UpdateState::TxBOpen)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, UpdateState::TxBCommitted | UpdateState::Failed(_))
    }

    /// Returns true if this is a failure that left transaction A committed.
    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            UpdateState::Failed(FailedStep::ExternalCall | FailedStep::Step2)
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateState::Idle => "Idle",
            UpdateState::TxAOpen => "TxAOpen",
            UpdateState::TxACommitted => "TxACommitted",
            UpdateState::ExternalInFlight => "ExternalInFlight",
            UpdateState::TxBOpen => "TxBOpen",
            UpdateState::TxBCommitted => "TxBCommitted",
            UpdateState::Failed(_) => "Failed",
        }
    }
}

impl std::fmt::Display for UpdateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateState::Failed(step) => write!(f, "Failed({step})"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Tracks the progress of one update through [`UpdateState`].
#[derive(Debug)]
pub(crate) struct UpdateTracker {
    update_id: UpdateId,
    entity_id: EntityId,
    state: UpdateState,
    history: Vec<UpdateState>,
}

impl UpdateTracker {
    pub(crate) fn new(entity_id: EntityId) -> Self {
        Self {
            update_id: UpdateId::new(),
            entity_id,
            state: UpdateState::Idle,
            history: vec![UpdateState::Idle],
        }
    }

    pub(crate) fn update_id(&self) -> UpdateId {
        self.update_id
    }

    pub(crate) fn state(&self) -> UpdateState {
        self.state
    }

    #[cfg(test)]
    pub(crate) fn history(&self) -> &[UpdateState] {
        &self.history
    }

    /// Moves to `next`, logging transitions the state machine does not allow.
    pub(crate) fn advance(&mut self, next: UpdateState) {
        let allowed = self.state.can_transition_to(next);
        if !allowed {
            tracing::error!(
                update_id = %self.update_id,
                entity_id = %self.entity_id,
                from = %self.state,
                to = %next,
                "invalid update state transition"
            );
        }
        debug_assert!(allowed, "invalid transition {} -> {}", self.state, next);

        tracing::debug!(
            update_id = %self.update_id,
            entity_id = %self.entity_id,
            from = %self.state,
            to = %next,
            "update state changed"
        );
        self.state = next;
        self.history.push(next);
    }
}
