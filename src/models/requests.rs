//! Request and Response Models
//!
//! One typed, validated payload per operation. Required fields are modelled as
//! `Option` plus `required` so a single validation pass reports every missing
//! or malformed field together.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::identity::{Identity, Role};
use super::profile::{Profile, ProfileFields};
use crate::utils::validation::{
    country_code_validator, email_validator, otp_code_validator, phone_validator,
};

/// Request payload for issuing an OTP
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpRequest {
    #[validate(required(message = "This field is required"))]
    #[validate(custom(function = "country_code_validator"))]
    pub country_code: Option<String>,

    #[validate(required(message = "This field is required"))]
    #[validate(custom(function = "phone_validator"))]
    pub phone: Option<String>,
}

/// Request payload for verifying an OTP
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    #[validate(required(message = "This field is required"))]
    #[validate(custom(function = "country_code_validator"))]
    pub country_code: Option<String>,

    #[validate(required(message = "This field is required"))]
    #[validate(custom(function = "phone_validator"))]
    pub phone: Option<String>,

    #[validate(required(message = "This field is required"))]
    #[validate(custom(function = "otp_code_validator"))]
    pub otp: Option<String>,
}

/// Request payload for credential login
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Phone number or email address
    #[validate(required(message = "This field is required"))]
    #[validate(length(min = 1, max = 255, message = "Identifier cannot be empty"))]
    pub identifier: Option<String>,

    #[validate(required(message = "This field is required"))]
    #[validate(length(min = 1, message = "Password cannot be empty"))]
    pub password: Option<String>,
}

/// Request payload for creating or updating an identity by phone
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateIdentityRequest {
    #[validate(required(message = "This field is required"))]
    #[validate(custom(function = "country_code_validator"))]
    pub country_code: Option<String>,

    #[validate(required(message = "This field is required"))]
    #[validate(custom(function = "phone_validator"))]
    pub phone: Option<String>,

    #[validate(required(message = "This field is required"))]
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: Option<String>,

    #[validate(required(message = "This field is required"))]
    #[validate(custom(function = "email_validator"))]
    pub email: Option<String>,

    #[validate(required(message = "This field is required"))]
    #[validate(range(min = 1, max = 120, message = "Age must be between 1 and 120"))]
    pub age: Option<i32>,

    #[validate(required(message = "This field is required"))]
    #[validate(length(
        min = 8,
        max = 128,
        message = "Password must be between 8 and 128 characters"
    ))]
    pub password: Option<String>,

    /// Omitted keeps the stored role (or patient for new identities)
    pub role: Option<Role>,

    /// Filename produced by the upload collaborator
    #[validate(length(min = 1, max = 255, message = "Profile image name is invalid"))]
    pub profile_image: Option<String>,
}

/// Request payload for a partial identity update
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIdentityRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: Option<String>,

    #[validate(custom(function = "email_validator"))]
    pub email: Option<String>,

    #[validate(range(min = 1, max = 120, message = "Age must be between 1 and 120"))]
    pub age: Option<i32>,
}

/// Request payload for registering or updating a profile
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterProfileRequest {
    #[validate(custom(function = "country_code_validator"))]
    pub country_code: Option<String>,

    #[validate(required(message = "This field is required"))]
    #[validate(custom(function = "phone_validator"))]
    pub phone: Option<String>,

    #[validate(length(max = 100, message = "Title is too long"))]
    pub title: Option<String>,

    #[validate(length(max = 32, message = "Gender is too long"))]
    pub gender: Option<String>,

    #[validate(length(max = 100, message = "Language is too long"))]
    pub language: Option<String>,

    pub dob: Option<NaiveDate>,

    #[validate(length(max = 16, message = "Service PIN is too long"))]
    pub service_pin: Option<String>,

    #[validate(length(max = 255, message = "Service area is too long"))]
    pub service_area: Option<String>,

    #[validate(length(max = 2000, message = "About me is too long"))]
    pub about_me: Option<String>,

    #[validate(range(min = 0, max = 80, message = "Experience must be between 0 and 80"))]
    pub experience: Option<i32>,

    #[serde(alias = "experience_year")]
    #[validate(length(max = 32, message = "Experience year is too long"))]
    pub experience_year: Option<String>,
}

impl RegisterProfileRequest {
    /// Splits the enrichment fields off the lookup key
    pub fn profile_fields(&self) -> ProfileFields {
        ProfileFields {
            title: self.title.clone(),
            gender: self.gender.clone(),
            language: self.language.clone(),
            dob: self.dob,
            service_pin: self.service_pin.clone(),
            service_area: self.service_area.clone(),
            about_me: self.about_me.clone(),
            experience: self.experience,
            experience_year: self.experience_year.clone(),
        }
    }
}

/// Query parameters for the identity directory
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListIdentitiesQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Response for OTP issuance
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpResponse {
    pub identity_id: Uuid,
    pub is_new_identity: bool,
    pub expires_at: DateTime<Utc>,
}

/// Response for OTP verification
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpResponse {
    pub identity_id: Uuid,
    pub phone_verified: bool,
}

/// Response for credential login
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub identity: Identity,
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Response for the phone-keyed upsert
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIdentityResponse {
    pub identity: Identity,
    pub created: bool,
}

/// Response for profile registration
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterProfileResponse {
    pub identity: Identity,
    pub profile: Profile,
    pub profile_created: bool,
}

/// Plain acknowledgement
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Response for health check
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}
