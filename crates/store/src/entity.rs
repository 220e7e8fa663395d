use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::EntityId;

/// A storable entity.
///
/// Entities are persisted as JSON documents keyed by `(entity_type, id)`.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Returns the entity type name used as part of the storage key.
    fn entity_type() -> &'static str;

    /// Returns the unique identifier of this entity.
    fn id(&self) -> EntityId;
}

/// Version number of a stored row, used for optimistic concurrency control.
///
/// A row that has never been written is at version 0; the first committed
/// write produces version 1 and every later write increments it by one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) of a row that does not exist yet.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the first version (1) of a newly inserted row.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// An entity together with the row metadata it was loaded with.
///
/// `version` is the version the entity was read at; saving the record asks
/// the store to write only if the row is still at that version.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<E> {
    pub entity: E,
    pub version: Version,
    pub updated_at: DateTime<Utc>,
}

impl<E: Entity> Versioned<E> {
    /// Wraps an entity that has not been stored yet.
    pub fn new(entity: E) -> Self {
        Self {
            entity,
            version: Version::initial(),
            updated_at: Utc::now(),
        }
    }

    /// Returns the entity ID.
    pub fn id(&self) -> EntityId {
        self.entity.id()
    }

    /// Returns true if this record has never been committed.
    pub fn is_new(&self) -> bool {
        self.version == Version::initial()
    }

    /// Unwraps the entity, discarding row metadata.
    pub fn into_inner(self) -> E {
        self.entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: EntityId,
    }

    impl Entity for Note {
        fn entity_type() -> &'static str {
            "Note"
        }

        fn id(&self) -> EntityId {
            self.id
        }
    }

    #[test]
    fn version_sequence() {
        assert_eq!(Version::initial().as_i64(), 0);
        assert_eq!(Version::initial().next(), Version::first());
        assert!(Version::first() > Version::initial());
    }

    #[test]
    fn new_record_is_unversioned() {
        let record = Versioned::new(Note {
            id: EntityId::new(3),
        });
        assert!(record.is_new());
        assert_eq!(record.id(), EntityId::new(3));
        assert_eq!(record.into_inner().id, EntityId::new(3));
    }
}
