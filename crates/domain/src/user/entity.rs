//! User entity.

use chrono::{DateTime, Utc};
use common::EntityId;
use serde::{Deserialize, Serialize};
use store::Entity;

use super::{
    ExternalResult, SyncStatus, UpdatePayload, UserError, validate_display_name, validate_email,
};

/// A user profile that is mirrored to an external system.
///
/// Mutations are pure: they only touch the in-memory value and never perform
/// I/O, so the caller decides which transaction persists them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    id: EntityId,
    display_name: String,
    email: String,
    sync_status: SyncStatus,

    /// Reference from the most recently applied external result.
    #[serde(default)]
    external_ref: Option<String>,

    #[serde(default)]
    last_synced_at: Option<DateTime<Utc>>,

    /// Reason recorded when a sync attempt was flagged as failed.
    #[serde(default)]
    sync_failure: Option<String>,

    /// Number of profile changes applied so far.
    #[serde(default)]
    revision: u64,
}

impl Entity for User {
    fn entity_type() -> &'static str {
        "User"
    }

    fn id(&self) -> EntityId {
        self.id
    }
}

impl User {
    /// Creates a new user that has never been synced.
    pub fn new(
        id: EntityId,
        display_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<Self, UserError> {
        let display_name = display_name.into();
        let email = email.into();
        validate_display_name(&display_name)?;
        validate_email(&email)?;

        Ok(Self {
            id,
            display_name,
            email,
            sync_status: SyncStatus::NeverSynced,
            external_ref: None,
            last_synced_at: None,
            sync_failure: None,
            revision: 0,
        })
    }

    /// Applies the first mutation: the profile change described by `payload`.
    ///
    /// The user becomes `Pending` until an external result is applied.
    pub fn apply_change(&mut self, payload: &UpdatePayload) -> Result<(), UserError> {
        payload.validate()?;

        if let Some(ref name) = payload.display_name {
            self.display_name = name.trim().to_string();
        }
        if let Some(ref email) = payload.email {
            self.email = email.to_ascii_lowercase();
        }
        self.revision += 1;
        self.sync_status = SyncStatus::Pending;
        self.sync_failure = None;
        Ok(())
    }

    /// Applies the second mutation: the result returned by the external system.
    pub fn apply_result(&mut self, result: &ExternalResult) -> Result<(), UserError> {
        if result.external_ref.trim().is_empty() {
            return Err(UserError::MissingExternalRef);
        }

        self.external_ref = Some(result.external_ref.clone());
        self.last_synced_at = Some(result.synced_at);
        self.sync_status = SyncStatus::Synced;
        self.sync_failure = None;
        Ok(())
    }

    /// Flags the pending sync as failed so it can be reviewed or retried.
    pub fn mark_sync_failed(&mut self, reason: impl Into<String>) {
        self.sync_status = SyncStatus::Failed;
        self.sync_failure = Some(reason.into());
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.sync_status
    }

    pub fn external_ref(&self) -> Option<&str> {
        self.external_ref.as_deref()
    }

    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.last_synced_at
    }

    pub fn sync_failure(&self) -> Option<&str> {
        self.sync_failure.as_deref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::new(EntityId::new(42), "Ada", "ada@example.com").unwrap()
    }

    #[test]
    fn new_user_has_never_synced() {
        let user = user();
        assert_eq!(user.id(), EntityId::new(42));
        assert_eq!(user.sync_status(), SyncStatus::NeverSynced);
        assert_eq!(user.revision(), 0);
        assert!(user.external_ref().is_none());
    }

    #[test]
    fn new_user_validates_fields() {
        assert!(matches!(
            User::new(EntityId::new(1), "", "a@b.io"),
            Err(UserError::InvalidDisplayName(_))
        ));
        assert!(matches!(
            User::new(EntityId::new(1), "A", "nope"),
            Err(UserError::InvalidEmail(_))
        ));
    }

    #[test]
    fn apply_change_updates_present_fields_only() {
        let mut user = user();
        let payload = UpdatePayload::new().with_email("ADA@Example.com");
        user.apply_change(&payload).unwrap();

        assert_eq!(user.display_name(), "Ada");
        assert_eq!(user.email(), "ada@example.com");
        assert_eq!(user.sync_status(), SyncStatus::Pending);
        assert_eq!(user.revision(), 1);
    }

    #[test]
    fn apply_change_rejects_invalid_payload_without_mutating() {
        let mut user = user();
        let before = user.clone();
        let result = user.apply_change(&UpdatePayload::new().with_display_name("  "));

        assert!(result.is_err());
        assert_eq!(user, before);
    }

    #[test]
    fn apply_result_marks_synced() {
        let mut user = user();
        user.apply_change(&UpdatePayload::new().with_display_name("Ada L."))
            .unwrap();

        let result = ExternalResult::new("CRM-0001");
        user.apply_result(&result).unwrap();

        assert_eq!(user.sync_status(), SyncStatus::Synced);
        assert_eq!(user.external_ref(), Some("CRM-0001"));
        assert_eq!(user.last_synced_at(), Some(result.synced_at));
    }

    #[test]
    fn apply_result_requires_reference() {
        let mut user = user();
        let result = user.apply_result(&ExternalResult::new(" "));
        assert_eq!(result, Err(UserError::MissingExternalRef));
    }

    #[test]
    fn mark_sync_failed_records_reason() {
        let mut user = user();
        user.apply_change(&UpdatePayload::new().with_display_name("B"))
            .unwrap();
        user.mark_sync_failed("crm rejected the change");

        assert_eq!(user.sync_status(), SyncStatus::Failed);
        assert_eq!(user.sync_failure(), Some("crm rejected the change"));

        // A later change clears the failure
        user.apply_change(&UpdatePayload::new().with_display_name("C"))
            .unwrap();
        assert_eq!(user.sync_status(), SyncStatus::Pending);
        assert!(user.sync_failure().is_none());
    }

    #[test]
    fn serialization_roundtrip() {
        let mut user = user();
        user.apply_change(&UpdatePayload::new().with_display_name("Z"))
            .unwrap();
        let json = serde_json::to_value(&user).unwrap();
        let back: User = serde_json::from_value(json).unwrap();
        assert_eq!(back, user);
    }
}
