//! Input DTOs for the auth flows and the rules they are validated against.
//!
//! Validation failures are safe to report per field, so [`describe`] renders
//! every failing field into a single client-facing message.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use validator::{Validate, ValidationErrors};

static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("static regex is valid"));

/// Registration payload.
///
/// Has no `role` field. Unknown JSON keys are ignored, so a client-supplied
/// role never reaches account creation.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(
        length(
            min = 3,
            max = 32,
            message = "must be between 3 and 32 characters"
        ),
        regex(
            path = *USERNAME_PATTERN,
            message = "may only contain letters, digits, '_', '.' and '-'"
        )
    )]
    pub username: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(
        min = 8,
        max = 128,
        message = "must be between 8 and 128 characters"
    ))]
    pub password: String,
    #[validate(length(max = 64, message = "must be at most 64 characters"))]
    pub display_name: Option<String>,
}

/// Login payload. `login` holds either a username or an email address.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginInput {
    #[serde(alias = "username", alias = "email")]
    #[validate(length(min = 1, message = "is required"))]
    pub login: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

/// Password change payload for an authenticated user.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePasswordInput {
    #[validate(length(min = 1, message = "is required"))]
    pub current_password: String,
    #[validate(length(
        min = 8,
        max = 128,
        message = "must be between 8 and 128 characters"
    ))]
    pub new_password: String,
}

/// Canonical form used for storing and looking up email addresses.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Render validation errors as `field: message; field: message`, sorted by
/// field name so the output is stable.
pub fn describe(errors: &ValidationErrors) -> String {
    let mut fields: Vec<String> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let reasons: Vec<String> = errs
                .iter()
                .map(|e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => e.code.to_string(),
                })
                .collect();
            format!("{field}: {}", reasons.join(", "))
        })
        .collect();
    fields.sort();
    fields.join("; ")
}
