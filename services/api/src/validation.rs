//! Input validation utilities
//!
//! Validators return the error code and message for a single field;
//! [`FieldErrors`] collects them so a request reports every bad field at once.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{ApiError, ApiResult, ErrorDetail, codes};
use crate::models::post::MAX_TITLE_LENGTH;

pub type Check = Result<(), (&'static str, String)>;

pub const MAX_NAME_LENGTH: usize = 150;
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Validate email
pub fn validate_email(email: &str) -> Check {
    if email.trim().is_empty() {
        return Err((codes::REQUIRED, "Email is required".to_string()));
    }

    if email.len() > 254 {
        return Err((
            codes::MAX_LENGTH,
            "Email must be at most 254 characters long".to_string(),
        ));
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email.trim()) {
        return Err((codes::INVALID, "Enter a valid email address".to_string()));
    }

    Ok(())
}

/// Validate password
pub fn validate_password(password: &str) -> Check {
    if password.is_empty() {
        return Err((codes::REQUIRED, "Password is required".to_string()));
    }

    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err((
            codes::MIN_LENGTH,
            format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LENGTH
            ),
        ));
    }

    if length > MAX_PASSWORD_LENGTH {
        return Err((
            codes::MAX_LENGTH,
            format!(
                "Password must be at most {} characters long",
                MAX_PASSWORD_LENGTH
            ),
        ));
    }

    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err((
            codes::INVALID,
            "Password cannot be entirely numeric".to_string(),
        ));
    }

    Ok(())
}

/// Required name part (first/last name)
pub fn validate_name(label: &str, value: &str) -> Check {
    if value.trim().is_empty() {
        return Err((codes::REQUIRED, format!("{} is required", label)));
    }
    validate_optional_name(label, value)
}

/// Optional name part; only the length is checked
pub fn validate_optional_name(label: &str, value: &str) -> Check {
    if value.chars().count() > MAX_NAME_LENGTH {
        return Err((
            codes::MAX_LENGTH,
            format!("{} must be at most {} characters long", label, MAX_NAME_LENGTH),
        ));
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Check {
    if title.trim().is_empty() {
        return Err((codes::BLANK, "Title may not be blank".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err((
            codes::MAX_LENGTH,
            format!("Title must be at most {} characters long", MAX_TITLE_LENGTH),
        ));
    }
    Ok(())
}

/// Accumulates per-field errors
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<ErrorDetail>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, attr: &str, result: Check) -> &mut Self {
        if let Err((code, detail)) = result {
            self.0.push(ErrorDetail::field(attr, code, detail));
        }
        self
    }

    pub fn push(&mut self, attr: &str, code: &str, detail: impl Into<String>) -> &mut Self {
        self.0.push(ErrorDetail::field(attr, code, detail));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn finish(self) -> ApiResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert_eq!(validate_email("").unwrap_err().0, codes::REQUIRED);
        assert_eq!(validate_email("user@").unwrap_err().0, codes::INVALID);
        assert_eq!(validate_email("no-at.example.com").unwrap_err().0, codes::INVALID);
    }

    #[test]
    fn test_password() {
        assert!(validate_password("correct horse").is_ok());
        assert_eq!(validate_password("short").unwrap_err().0, codes::MIN_LENGTH);
        assert_eq!(validate_password(&"x".repeat(129)).unwrap_err().0, codes::MAX_LENGTH);
        assert_eq!(validate_password("12345678").unwrap_err().0, codes::INVALID);
    }

    #[test]
    fn test_names_and_titles() {
        assert_eq!(validate_name("First name", " ").unwrap_err().0, codes::REQUIRED);
        assert_eq!(
            validate_name("First name", &"a".repeat(151)).unwrap_err().0,
            codes::MAX_LENGTH
        );
        assert!(validate_optional_name("Middle name", "").is_ok());
        assert_eq!(validate_title("   ").unwrap_err().0, codes::BLANK);
        assert!(validate_title(&"t".repeat(200)).is_ok());
        assert!(validate_title(&"t".repeat(201)).is_err());
    }

    #[test]
    fn test_field_errors_collects_everything() {
        let mut errors = FieldErrors::new();
        errors
            .check("email", validate_email("bad"))
            .check("password", validate_password("short"))
            .check("first_name", validate_name("First name", "Ivan"));

        match errors.finish() {
            Err(ApiError::Validation(details)) => {
                let attrs: Vec<_> = details.iter().filter_map(|d| d.attr.as_deref()).collect();
                assert_eq!(attrs, vec!["email", "password"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
