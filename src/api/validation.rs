//! Input validation for form submissions.
//!
//! Validators return `Result<(), String>` with a user-facing message; the
//! form-level functions collect them through `ValidationErrorBuilder` so every
//! bad field is reported at once and nothing reaches the network.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{ClientError, ValidationErrorBuilder};
use crate::models::{NewListing, SignupForm, SignupRequest};

lazy_static! {
    /// Loose email shape check; the backend does the real verification
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^\s@]+@[^\s@]+\.[^\s@]+$"
    ).unwrap();
}

pub const MIN_USERNAME_LEN: usize = 2;
pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_FOOD_NAME_LEN: usize = 2;
pub const MIN_LOCATION_LEN: usize = 2;

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.trim().is_empty() {
        return Err("Email is required".to_string());
    }

    if !EMAIL_REGEX.is_match(email.trim()) {
        return Err("Please enter a valid email address".to_string());
    }

    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), String> {
    if username.trim().chars().count() < MIN_USERNAME_LEN {
        return Err(format!(
            "Username must be at least {} characters",
            MIN_USERNAME_LEN
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    Ok(())
}

/// Validate login input before sending it
pub fn validate_credentials(email: &str, password: &str) -> Result<(), ClientError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("email", validate_email(email));
    if password.is_empty() {
        errors.add("password", "Password is required");
    }
    errors.finish()
}

/// Validate the signup form and turn it into the request body
pub fn validate_signup(form: &SignupForm) -> Result<SignupRequest, ClientError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("username", validate_username(&form.username));
    errors.check("email", validate_email(&form.email));
    errors.check("password", validate_password(&form.password));
    if form.password != form.confirm_password {
        errors.add("confirm_password", "Passwords do not match");
    }
    if form.role.is_none() {
        errors.add("role", "Please select an account type");
    }
    errors.finish()?;

    let role = form
        .role
        .ok_or_else(|| ClientError::validation_field("role", "Please select an account type"))?;

    Ok(SignupRequest {
        username: form.username.trim().to_string(),
        email: form.email.trim().to_string(),
        password: form.password.clone(),
        role,
    })
}

/// Validate a new surplus listing
pub fn validate_listing(listing: &NewListing) -> Result<(), ClientError> {
    let mut errors = ValidationErrorBuilder::new();
    if listing.food_name.trim().chars().count() < MIN_FOOD_NAME_LEN {
        errors.add(
            "food_name",
            format!(
                "Food name must be at least {} characters.",
                MIN_FOOD_NAME_LEN
            ),
        );
    }
    if listing.quantity.trim().is_empty() {
        errors.add("quantity", "Quantity is required.");
    }
    if listing.location.trim().chars().count() < MIN_LOCATION_LEN {
        errors.add("location", "Location is required.");
    }
    errors.finish()
}
