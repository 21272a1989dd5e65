//! Client-side form validation for the auth screens.
//!
//! Validation failures block submission before any network call is
//! made; the messages are the ones the screens render inline.

use crate::error::{ClientError, FieldError};

/// Minimal email shape check: one `@`, non-empty local part, and a
/// domain with at least one dot. Full RFC parsing is the backend's job.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

/// Validate the login form.
pub fn validate_login(email: &str, password: &str) -> Result<(), ClientError> {
    let mut errors = Vec::new();
    if !is_valid_email(email) {
        errors.push(FieldError::new("email", "Invalid email address"));
    }
    if password.is_empty() {
        errors.push(FieldError::new("password", "Password is required"));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ClientError::Validation(errors))
    }
}

/// Validate the sign-up form, including the confirm-password field
/// that is never sent to the server.
pub fn validate_sign_up(
    email: &str,
    password: &str,
    confirm_password: &str,
    first_name: &str,
    last_name: &str,
) -> Result<(), ClientError> {
    let mut errors = Vec::new();
    if !is_valid_email(email) {
        errors.push(FieldError::new("email", "Invalid email address"));
    }
    if password.len() < 8 {
        errors.push(FieldError::new(
            "password",
            "Password must be at least 8 characters",
        ));
    }
    if password != confirm_password {
        errors.push(FieldError::new("confirmPassword", "Passwords don't match"));
    }
    if first_name.trim().is_empty() {
        errors.push(FieldError::new("firstName", "First name is required"));
    }
    if last_name.trim().is_empty() {
        errors.push(FieldError::new("lastName", "Last name is required"));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ClientError::Validation(errors))
    }
}
