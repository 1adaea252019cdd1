//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::roster::MAX_NICKNAME_CHARS;

/// Validates that a nickname is non-blank and at most [`MAX_NICKNAME_CHARS`] characters.
pub fn validate_nickname(nickname: &str) -> Result<(), ValidationError> {
    let trimmed = nickname.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("nickname_blank");
        err.message = Some("Nickname must not be blank".into());
        return Err(err);
    }

    let count = trimmed.chars().count();
    if count > MAX_NICKNAME_CHARS {
        let mut err = ValidationError::new("nickname_length");
        err.message = Some(
            format!("Nickname must be at most {MAX_NICKNAME_CHARS} characters (got {count})")
                .into(),
        );
        return Err(err);
    }

    if trimmed.chars().any(char::is_control) {
        let mut err = ValidationError::new("nickname_format");
        err.message = Some("Nickname must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_nickname() {
        assert!(validate_nickname("Ana").is_ok());
        assert!(validate_nickname("  Ana  ").is_ok());
        assert!(validate_nickname("   ").is_err());
        assert!(validate_nickname(&"x".repeat(MAX_NICKNAME_CHARS + 1)).is_err());
        assert!(validate_nickname("An\u{7}a").is_err());
    }
}
