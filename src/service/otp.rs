//! OTP Service
//!
//! Issues and verifies the one-time codes that prove ownership of a phone
//! number. Issuance doubles as the implicit registration path: the first code
//! requested for an unseen phone creates a stub identity.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use validator::Validate;

use crate::config::OtpConfig;
use crate::database::IdentityStore;
use crate::models::{SendOtpRequest, SendOtpResponse, VerifyOtpRequest, VerifyOtpResponse};
use crate::service::require;
use crate::utils::{
    error::{AppError, AppResult},
    security::{constant_time_compare, mask_phone, rotate_otp_code},
};

/// Outbound channel for freshly issued codes
#[async_trait]
pub trait OtpDelivery: Send + Sync {
    async fn deliver(
        &self,
        country_code: &str,
        phone: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()>;
}

/// Delivery that only writes to the log
///
/// The code itself is logged at debug level so local development works
/// without an SMS gateway.
#[derive(Debug, Default, Clone)]
pub struct LoggingOtpDelivery;

#[async_trait]
impl OtpDelivery for LoggingOtpDelivery {
    async fn deliver(
        &self,
        country_code: &str,
        phone: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let masked = mask_phone(phone);
        log::info!("OTP issued for {} {}, expires at {}", country_code, masked, expires_at);
        log::debug!("OTP for {} {} is {}", country_code, masked, code);
        Ok(())
    }
}

/// OTP issuance and verification
#[derive(Clone)]
pub struct OtpService {
    store: Arc<dyn IdentityStore>,
    delivery: Arc<dyn OtpDelivery>,
    ttl: Duration,
    fixed_code: Option<String>,
}

impl OtpService {
    pub fn new(store: Arc<dyn IdentityStore>, delivery: Arc<dyn OtpDelivery>) -> Self {
        Self {
            store,
            delivery,
            ttl: Duration::minutes(5),
            fixed_code: None,
        }
    }

    pub fn with_config(mut self, config: &OtpConfig) -> Self {
        self.ttl = Duration::minutes(config.ttl_minutes);
        if let Some(code) = &config.fixed_code {
            log::warn!("OTP_FIXED_CODE is set; every issued code will be {}", code);
        }
        self.fixed_code = config.fixed_code.clone();
        self
    }

    /// Find-or-create the identity for the phone and rotate its code
    pub async fn issue_otp(&self, request: SendOtpRequest) -> AppResult<SendOtpResponse> {
        request.validate()?;
        let country_code = require(request.country_code, "countryCode")?;
        let phone = require(request.phone, "phone")?;

        let code = match &self.fixed_code {
            Some(code) => code.clone(),
            None => {
                let current = self.store.find_by_natural_key(&country_code, &phone).await?;
                rotate_otp_code(current.as_ref().and_then(|record| record.otp.as_deref()))
            }
        };
        let expires_at = Utc::now() + self.ttl;

        let issued = self
            .store
            .issue_otp(&country_code, &phone, &code, expires_at)
            .await?;

        if issued.created {
            log::info!(
                "Created identity {} for {} {}",
                issued.record.id,
                country_code,
                mask_phone(&phone)
            );
        }

        self.delivery
            .deliver(&country_code, &phone, &code, expires_at)
            .await?;

        Ok(SendOtpResponse {
            identity_id: issued.record.id,
            is_new_identity: issued.created,
            expires_at,
        })
    }

    /// Consume the outstanding code for the phone
    pub async fn verify_otp(&self, request: VerifyOtpRequest) -> AppResult<VerifyOtpResponse> {
        request.validate()?;
        let country_code = require(request.country_code, "countryCode")?;
        let phone = require(request.phone, "phone")?;
        let code = require(request.otp, "otp")?;

        // Exact natural key first, then any live identity holding the phone
        let record = match self.store.find_by_natural_key(&country_code, &phone).await? {
            Some(record) => Some(record),
            None => self.store.find_by_phone(&phone).await?,
        }
        .ok_or_else(|| AppError::NotFound("No identity exists for this phone".to_string()))?;

        let matches = record
            .otp
            .as_deref()
            .is_some_and(|stored| constant_time_compare(stored, &code));
        if !matches {
            log::warn!("Invalid OTP submitted for {}", mask_phone(&phone));
            return Err(AppError::InvalidCode);
        }

        let now = Utc::now();
        if record.otp_expire_at.map_or(true, |expiry| now > expiry) {
            return Err(AppError::Expired);
        }

        // Conditional write: a concurrent rotation or verification wins
        let verified = self
            .store
            .consume_otp(record.id, &code, now)
            .await?
            .ok_or(AppError::InvalidCode)?;

        log::info!("Phone verified for identity {}", verified.id);

        Ok(VerifyOtpResponse {
            identity_id: verified.id,
            phone_verified: verified.phone_verified,
        })
    }
}
