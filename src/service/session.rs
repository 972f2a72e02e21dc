//! Session Service
//!
//! Credential login. Identifiers match phone first, then email.

use std::sync::Arc;
use validator::Validate;

use crate::database::IdentityStore;
use crate::models::{IdentityRecord, LoginRequest, LoginResponse};
use crate::service::{require, JwtService};
use crate::utils::{
    error::{AppError, AppResult},
    security::{
        constant_time_compare, hash_password_with_cost, is_password_digest, verify_password,
        DEFAULT_BCRYPT_COST,
    },
};

#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn IdentityStore>,
    jwt: Arc<JwtService>,
    bcrypt_cost: u32,
}

impl SessionService {
    pub fn new(store: Arc<dyn IdentityStore>, jwt: Arc<JwtService>) -> Self {
        Self {
            store,
            jwt,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }

    /// Cost used when upgrading legacy plaintext credentials
    pub fn with_bcrypt_cost(mut self, bcrypt_cost: u32) -> Self {
        self.bcrypt_cost = bcrypt_cost;
        self
    }

    /// Authenticate an identifier/password pair and mint a session token
    pub async fn login(&self, request: LoginRequest) -> AppResult<LoginResponse> {
        request.validate()?;
        let identifier = require(request.identifier, "identifier")?;
        let password = require(request.password, "password")?;

        let record = self
            .store
            .find_by_identifier(&identifier)
            .await?
            .ok_or_else(|| AppError::NotFound("No identity matches this identifier".to_string()))?;

        self.check_password(&record, &password).await?;

        let issued = self.jwt.issue(record.id, record.role)?;
        log::info!("Issued session token for identity {}", record.id);

        Ok(LoginResponse {
            identity: record.into(),
            token: issued.token,
            token_type: issued.token_type,
            expires_in: issued.expires_in,
        })
    }

    async fn check_password(&self, record: &IdentityRecord, password: &str) -> AppResult<()> {
        // OTP stubs have no credential yet
        let Some(stored) = record.password.as_deref() else {
            return Err(AppError::InvalidCredential);
        };

        if is_password_digest(stored) {
            return if verify_password(password, stored)? {
                Ok(())
            } else {
                Err(AppError::InvalidCredential)
            };
        }

        // Legacy plaintext credential: compare once, then replace with a digest
        if !constant_time_compare(stored, password) {
            return Err(AppError::InvalidCredential);
        }

        let digest = hash_password_with_cost(password, self.bcrypt_cost)?;
        self.store.set_password(record.id, &digest).await?;
        log::info!("Upgraded legacy credential for identity {}", record.id);
        Ok(())
    }
}
