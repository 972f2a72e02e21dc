//! JWT Session Service
//!
//! Issues and verifies HS256 session tokens. The signing secret is fixed for the
//! lifetime of the service and shared by the session issuer and the access guard.

use crate::config::JwtConfig;
use crate::models::{IssuedToken, Principal, Role, SessionClaims};
use crate::utils::error::{AppError, AppResult};
use crate::utils::security::generate_secure_token;
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use uuid::Uuid;

/// Token type reported alongside issued tokens
pub const TOKEN_TYPE: &str = "Bearer";

/// JWT service for session token issuance and verification
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    /// Token lifetime (default: 24 hours)
    expires_in: Duration,
    issuer: String,
}

impl JwtService {
    /// Create a service with an explicit secret and lifetime
    pub fn new(secret: &str, expires_in: Duration, issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expires_in,
            issuer: issuer.into(),
        }
    }

    /// Build from configuration, generating a process-lifetime secret when none is set
    pub fn from_config(config: &JwtConfig) -> Self {
        let secret = match &config.secret {
            Some(secret) => secret.clone(),
            None => {
                log::warn!(
                    "JWT_SECRET is not set; using a generated secret. Tokens will not survive a restart"
                );
                generate_secure_token(64)
            }
        };

        Self::new(&secret, Duration::hours(config.expires_hours), config.issuer.clone())
    }

    pub fn expires_in(&self) -> Duration {
        self.expires_in
    }

    /// Sign a session token for the identity
    pub fn issue(&self, identity_id: Uuid, role: Role) -> AppResult<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + self.expires_in;
        let claims = SessionClaims::new(identity_id, role, now, expires_at, &self.issuer);

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

        Ok(IssuedToken {
            token,
            token_type: TOKEN_TYPE.to_string(),
            expires_at,
            expires_in: self.expires_in.num_seconds(),
        })
    }

    /// Verify signature, issuer, and expiry, then extract the principal
    pub fn authenticate(&self, token: &str) -> AppResult<Principal> {
        let claims = self.decode_claims(token)?;
        Principal::from_claims(&claims)
            .map_err(|_| AppError::Unauthorized("Invalid subject in token".to_string()))
    }

    fn decode_claims(&self, token: &str) -> AppResult<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    AppError::Unauthorized("Token has expired".to_string())
                }
                _ => AppError::Unauthorized("Invalid token".to_string()),
            })
    }
}
