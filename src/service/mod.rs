//! Service Layer
//!
//! Business logic for OTP verification, identity upserts, profile linkage, and
//! sessions. Services depend on the store traits, never on a concrete backend.

pub mod identity;
pub mod jwt;
pub mod otp;
pub mod profile;
pub mod session;

// Re-export services
pub use identity::IdentityService;
pub use jwt::JwtService;
pub use otp::{LoggingOtpDelivery, OtpDelivery, OtpService};
pub use profile::ProfileService;
pub use session::SessionService;

use crate::utils::error::{AppError, AppResult};

/// Unwrap a field that request validation has already marked as required
pub(crate) fn require<T>(value: Option<T>, field: &str) -> AppResult<T> {
    value.ok_or_else(|| AppError::Validation(format!("Field '{}' is required", field)))
}
