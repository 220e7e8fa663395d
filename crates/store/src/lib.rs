//! Transactional storage for entities.
//!
//! A [`Repository`] hands out [`Transaction`] handles. Each handle is consumed
//! exactly once by `commit` or `rollback`; dropping an unfinished handle rolls
//! it back. Rows carry a [`Version`] used for optimistic concurrency control.

pub mod entity;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use common::EntityId;
pub use entity::{Entity, Version, Versioned};
pub use error::{Result, StoreError};
pub use memory::{InMemoryRepository, InMemoryTransaction};
pub use postgres::{PostgresRepository, PostgresTransaction};
pub use repository::{Repository, RepositoryExt, Transaction};
