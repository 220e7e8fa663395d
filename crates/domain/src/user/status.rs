//! Synchronization status of a user with the external system.

use serde::{Deserialize, Serialize};

/// Where a user stands with respect to the external system.
///
/// Status transitions:
/// ```text
/// NeverSynced ──► Pending ──┬──► Synced ──► Pending ...
///                           └──► Failed ──► Pending ...
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SyncStatus {
    /// The user was created and never sent to the external system.
    #[default]
    NeverSynced,

    /// A local change was committed and awaits the external result.
    Pending,

    /// The latest external result has been applied.
    Synced,

    /// A sync attempt was abandoned and flagged for review.
    Failed,
}

impl SyncStatus {
    /// Returns true if a local change is waiting for the external result.
    pub fn is_pending(&self) -> bool {
        matches!(self, SyncStatus::Pending)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::NeverSynced => "NeverSynced",
            SyncStatus::Pending => "Pending",
            SyncStatus::Synced => "Synced",
            SyncStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
