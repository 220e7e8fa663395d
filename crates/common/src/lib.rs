//! Shared types for the two-phase update system.

pub mod journal;
pub mod types;

pub use journal::{Call, CallJournal};
pub use types::{EntityId, UpdateId};
