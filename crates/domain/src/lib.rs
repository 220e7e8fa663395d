//! Domain layer for the two-phase update system.
//!
//! This crate provides:
//! - The `User` entity with its pure mutation functions
//! - `UpdatePayload` (first mutation) and `ExternalResult` (second mutation)
//! - `UserService` for creating and reading users in short transactions

pub mod error;
pub mod user;

pub use error::DomainError;
pub use user::{ExternalResult, SyncStatus, UpdatePayload, User, UserError, UserService};
