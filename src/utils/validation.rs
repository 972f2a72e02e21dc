//! Validation Utilities
//!
//! Input validation functions for identity data and API requests.

use regex::Regex;
use std::sync::OnceLock;
use validator::ValidationError;

/// Validates email address format using a comprehensive regex pattern
pub fn validate_email(email: &str) -> bool {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    regex.is_match(email)
}

/// Normalizes email address to lowercase and removes whitespace
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Subscriber numbers are exactly ten digits
pub fn validate_phone(phone: &str) -> bool {
    static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = PHONE_REGEX
        .get_or_init(|| Regex::new(r"^\d{10}$").expect("Failed to compile phone regex"));

    regex.is_match(phone)
}

/// Dialing prefix such as `+91` or `1`
pub fn validate_country_code(country_code: &str) -> bool {
    static COUNTRY_CODE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = COUNTRY_CODE_REGEX.get_or_init(|| {
        Regex::new(r"^\+?\d{1,4}$").expect("Failed to compile country code regex")
    });

    regex.is_match(country_code)
}

/// OTP codes are exactly six digits
pub fn validate_otp_code(code: &str) -> bool {
    code.len() == 6 && code.chars().all(|c| c.is_ascii_digit())
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

/// Custom validator for email fields using the validator crate
pub fn email_validator(email: &str) -> Result<(), ValidationError> {
    if validate_email(email) {
        Ok(())
    } else {
        Err(invalid("invalid_email", messages::INVALID_EMAIL))
    }
}

/// Custom validator for phone fields
pub fn phone_validator(phone: &str) -> Result<(), ValidationError> {
    if validate_phone(phone) {
        Ok(())
    } else {
        Err(invalid("invalid_phone", messages::INVALID_PHONE))
    }
}

/// Custom validator for country code fields
pub fn country_code_validator(country_code: &str) -> Result<(), ValidationError> {
    if validate_country_code(country_code) {
        Ok(())
    } else {
        Err(invalid("invalid_country_code", messages::INVALID_COUNTRY_CODE))
    }
}

/// Custom validator for OTP code fields
pub fn otp_code_validator(code: &str) -> Result<(), ValidationError> {
    if validate_otp_code(code) {
        Ok(())
    } else {
        Err(invalid("invalid_otp", messages::INVALID_OTP))
    }
}

/// Validation error messages for user-friendly responses
pub mod messages {
    pub const INVALID_EMAIL: &str = "Please enter a valid email address";
    pub const INVALID_PHONE: &str = "Phone number must be exactly 10 digits";
    pub const INVALID_COUNTRY_CODE: &str = "Country code must be 1-4 digits with an optional '+'";
    pub const INVALID_OTP: &str = "OTP must be exactly 6 digits";
}
