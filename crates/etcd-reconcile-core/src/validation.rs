//! Input checks applied before any store call.

use crate::error::{CoreError, Result};

/// A key path must be non-empty.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CoreError::EmptyKey);
    }
    Ok(())
}

/// Role names must be non-empty and free of control characters.
pub fn validate_role_name(name: &str) -> Result<()> {
    validate_name("role", name)
}

/// User names must be non-empty and free of control characters.
pub fn validate_user_name(name: &str) -> Result<()> {
    validate_name("user", name)
}

fn validate_name(kind: &'static str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CoreError::EmptyName { kind });
    }
    if name.chars().any(char::is_control) {
        return Err(CoreError::InvalidName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}
