// Validation utilities for string fields

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // 3-32 chars, letters/digits/underscore/dot/dash, must start alphanumeric
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]{2,31}$").unwrap();
}

/// Trim a field, rejecting empty values when required
pub fn trim_and_validate_field(field: &str, required: bool) -> Result<String, String> {
    let trimmed = field.trim().to_string();
    if trimmed.is_empty() && required {
        return Err("Field cannot be empty".to_string());
    }
    Ok(trimmed)
}

/// Trim an optional field, collapsing empty strings to None
pub fn trim_optional_field(field: Option<&String>) -> Option<String> {
    field.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Username format check used at registration
pub fn validate_username(username: &str) -> Result<(), String> {
    if USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        Err("Username must be 3-32 characters: letters, digits, '_', '.', '-'".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_required_field() {
        assert_eq!(trim_and_validate_field("  bob ", true).unwrap(), "bob");
        assert!(trim_and_validate_field("   ", true).is_err());
        assert_eq!(trim_and_validate_field("", false).unwrap(), "");
    }

    #[test]
    fn test_trim_optional_field() {
        assert_eq!(trim_optional_field(None), None);
        assert_eq!(trim_optional_field(Some(&"  ".to_string())), None);
        assert_eq!(
            trim_optional_field(Some(&" acme ".to_string())),
            Some("acme".to_string())
        );
    }

    #[test]
    fn test_username_format() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("a1_b.c-d").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("-leading").is_err());
        assert!(validate_username("way@too@odd").is_err());
        assert!(validate_username(&"x".repeat(33)).is_err());
    }
}
