//! Common validation utilities.

use validator::ValidationError;

use crate::connection_string::{is_masked, ConnectionString};

/// Validates that a string contains something other than whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}

/// Validates a connection string supplied on create.
///
/// It must parse and must not be a masked copy of a stored value.
pub fn validate_connection_string(value: &str) -> Result<(), ValidationError> {
    match ConnectionString::parse(value) {
        Ok(_) => Ok(()),
        Err(e) => {
            let mut err = ValidationError::new("connection_string");
            err.message = Some(e.to_string().into());
            Err(err)
        }
    }
}

/// Validates a connection string supplied on update.
///
/// Empty and masked values are accepted; they mean "keep the stored one".
pub fn validate_connection_string_update(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() || is_masked(value) {
        return Ok(());
    }
    validate_connection_string(value)
}
