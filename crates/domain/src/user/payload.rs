//! Inputs of the two mutations applied during an update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{UserError, validate_display_name, validate_email};

/// Describes the first mutation: the profile fields to change.
///
/// Absent fields are left untouched. A payload must change at least one field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UpdatePayload {
    /// Creates an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the new display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Sets the new email address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Checks that the payload is non-empty and every present field is valid.
    pub fn validate(&self) -> Result<(), UserError> {
        if self.display_name.is_none() && self.email.is_none() {
            return Err(UserError::EmptyPayload);
        }
        if let Some(ref name) = self.display_name {
            validate_display_name(name)?;
        }
        if let Some(ref email) = self.email {
            validate_email(email)?;
        }
        Ok(())
    }
}

/// Describes the second mutation, as returned by the external system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalResult {
    /// Reference assigned by the external system.
    pub external_ref: String,

    /// When the external system accepted the change.
    pub synced_at: DateTime<Utc>,
}

impl ExternalResult {
    /// Creates a result stamped with the current time.
    pub fn new(external_ref: impl Into<String>) -> Self {
        Self {
            external_ref: external_ref.into(),
            synced_at: Utc::now(),
        }
    }
}
