//! Validation helpers for DTOs.

use validator::ValidationError;

/// Maximum accepted length for a session identifier.
pub const MAX_SESSION_ID_LENGTH: usize = 64;
/// Maximum accepted length for a username.
pub const MAX_USERNAME_LENGTH: usize = 32;

/// Validates that a session id is a URL-safe slug: 1 to 64 ASCII letters,
/// digits, hyphens, or underscores.
pub fn validate_session_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_SESSION_ID_LENGTH {
        let mut err = ValidationError::new("session_id_length");
        err.message = Some(
            format!("Session id must be 1 to {MAX_SESSION_ID_LENGTH} characters").into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("session_id_format");
        err.message =
            Some("Session id may only contain letters, digits, hyphens, and underscores".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a username is non-blank and at most 32 characters.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() {
        let mut err = ValidationError::new("username_blank");
        err.message = Some("Username must not be blank".into());
        return Err(err);
    }

    if username.chars().count() > MAX_USERNAME_LENGTH {
        let mut err = ValidationError::new("username_length");
        err.message =
            Some(format!("Username must be at most {MAX_USERNAME_LENGTH} characters").into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_session_id_valid() {
        assert!(validate_session_id("friday-night").is_ok());
        assert!(validate_session_id("room_42").is_ok());
        assert!(validate_session_id("A").is_ok());
    }

    #[test]
    fn test_validate_session_id_invalid() {
        assert!(validate_session_id("").is_err());
        assert!(validate_session_id(&"x".repeat(65)).is_err());
        assert!(validate_session_id("has space").is_err());
        assert!(validate_session_id("../escape").is_err());
    }

    #[test]
    fn test_validate_username_valid() {
        assert!(validate_username("Ana").is_ok());
        assert!(validate_username("Jo Ann").is_ok());
    }

    #[test]
    fn test_validate_username_invalid() {
        assert!(validate_username("").is_err());
        assert!(validate_username("   ").is_err());
        assert!(validate_username(&"x".repeat(33)).is_err());
    }
}
