//! User entity and related types.

mod entity;
mod payload;
mod service;
mod status;

pub use entity::User;
pub use payload::{ExternalResult, UpdatePayload};
pub use service::UserService;
pub use status::SyncStatus;

use thiserror::Error;

/// Maximum length of a display name, in characters.
pub const MAX_DISPLAY_NAME_LEN: usize = 100;

/// Errors that can occur when mutating a user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserError {
    /// The payload does not change anything.
    #[error("Update payload is empty")]
    EmptyPayload,

    /// Display name is blank or too long.
    #[error("Invalid display name: {0:?}")]
    InvalidDisplayName(String),

    /// Email address is malformed.
    #[error("Invalid email address: {0:?}")]
    InvalidEmail(String),

    /// The external result carries no reference.
    #[error("External result has no reference")]
    MissingExternalRef,
}

fn validate_display_name(name: &str) -> Result<(), UserError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(UserError::InvalidDisplayName(name.to_string()));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), UserError> {
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace) =>
        {
            Ok(())
        }
        _ => Err(UserError::InvalidEmail(email.to_string())),
    }
}
