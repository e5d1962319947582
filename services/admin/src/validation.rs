//! Input validation utilities

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

/// Validate username
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required".to_string());
    }

    if username.len() < 3 {
        return Err("Username must be at least 3 characters long".to_string());
    }

    if username.len() > 32 {
        return Err("Username must be at most 32 characters long".to_string());
    }

    static USERNAME_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    let regex = USERNAME_REGEX.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_.-]+$").ok());

    if !regex.as_ref().is_some_and(|r| r.is_match(username)) {
        return Err(
            "Username can only contain letters, numbers, dots, dashes and underscores".to_string(),
        );
    }

    Ok(())
}

/// Validate a permission URL pattern
pub fn validate_url(url: &str) -> Result<(), String> {
    if !url.starts_with('/') {
        return Err("URL must start with '/'".to_string());
    }

    if url.len() > 512 {
        return Err("URL must be at most 512 characters long".to_string());
    }

    if url.chars().any(char::is_whitespace) {
        return Err("URL must not contain whitespace".to_string());
    }

    Ok(())
}

/// Normalize and validate an HTTP method
pub fn validate_method(method: &str) -> Result<String, String> {
    let method = method.trim().to_ascii_uppercase();
    match method.as_str() {
        "GET" | "POST" | "PUT" | "PATCH" | "DELETE" | "HEAD" | "OPTIONS" => Ok(method),
        _ => Err(format!("Unsupported HTTP method: {method}")),
    }
}

/// Password strength, ordered from weakest to strongest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordStrength {
    VeryWeak,
    Weak,
    Medium,
    Strong,
}

/// Score a password by character classes and length
pub fn password_strength(password: &str) -> PasswordStrength {
    let mut has_upper = false;
    let mut has_lower = false;
    let mut has_digit = false;
    let mut has_special = false;

    for c in password.chars() {
        if c.is_ascii_uppercase() {
            has_upper = true;
        } else if c.is_ascii_lowercase() {
            has_lower = true;
        } else if c.is_ascii_digit() {
            has_digit = true;
        } else if !c.is_alphanumeric() {
            has_special = true;
        }
    }

    let classes = [has_upper, has_lower, has_digit, has_special]
        .iter()
        .filter(|&&present| present)
        .count();
    let length = password.chars().count();
    let score = classes + usize::from(length >= 8) + usize::from(length >= 12);

    match score {
        0..=1 => PasswordStrength::VeryWeak,
        2..=3 => PasswordStrength::Weak,
        4..=5 => PasswordStrength::Medium,
        _ => PasswordStrength::Strong,
    }
}

/// Validate password against a minimum strength
pub fn validate_password(password: &str, minimum: PasswordStrength) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.len() > 128 {
        return Err("Password must be at most 128 characters long".to_string());
    }

    if password_strength(password) < minimum {
        return Err("Password is too weak".to_string());
    }

    Ok(())
}
