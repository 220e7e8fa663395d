//! Shared call journal for observing collaborator ordering.
//!
//! The in-memory repository and external client can both record into the same
//! journal, which makes the relative order of transaction boundaries and
//! external calls observable.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A single recorded collaborator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Begin,
    Load,
    Save,
    Commit,
    Rollback,
    ExternalCall,
}

impl Call {
    /// Returns the call name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Call::Begin => "begin",
            Call::Load => "load",
            Call::Save => "save",
            Call::Commit => "commit",
            Call::Rollback => "rollback",
            Call::ExternalCall => "external_call",
        }
    }
}

impl std::fmt::Display for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only, cloneable log of collaborator calls.
#[derive(Debug, Clone, Default)]
pub struct CallJournal {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallJournal {
    /// Creates an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a call.
    pub fn record(&self, call: Call) {
        self.lock().push(call);
    }

    /// Returns a copy of all recorded calls in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().clone()
    }

    /// Returns the position of the first occurrence of `call`.
    pub fn position(&self, call: Call) -> Option<usize> {
        self.calls().iter().position(|c| *c == call)
    }

    /// Returns how many times `call` was recorded.
    pub fn count(&self, call: Call) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    /// Removes all recorded calls.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Call>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
