//! Authentication Models
//!
//! Session token claims and the principal derived from a verified token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identity::Role;
use crate::utils::error::{AppError, AppResult};

/// JWT claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject - identity ID
    pub sub: String,

    /// Role at the time of issuance
    pub role: Role,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// JWT ID - unique token identifier
    pub jti: String,

    /// Issuer
    pub iss: String,
}

impl SessionClaims {
    pub fn new(
        identity_id: Uuid,
        role: Role,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        issuer: &str,
    ) -> Self {
        Self {
            sub: identity_id.to_string(),
            role,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
            iss: issuer.to_string(),
        }
    }
}

/// A freshly minted session token
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    /// Seconds until expiry
    pub expires_in: i64,
}

/// Authenticated actor extracted from a verified token
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub subject: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn from_claims(claims: &SessionClaims) -> Result<Self, uuid::Error> {
        Ok(Self {
            subject: Uuid::parse_str(&claims.sub)?,
            role: claims.role,
        })
    }

    /// Role allow-list check; looks at nothing but `role`
    pub fn authorize(&self, allowed_roles: &[Role]) -> AppResult<()> {
        if allowed_roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Role '{}' is not permitted to perform this operation",
                self.role
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role) -> Principal {
        Principal {
            subject: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn test_claims_creation() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let expires_at = now + chrono::Duration::hours(24);

        let claims = SessionClaims::new(id, Role::Partner, now, expires_at, "identity-service");

        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.role, Role::Partner);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn test_principal_from_claims() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let claims = SessionClaims::new(id, Role::Patient, now, now, "identity-service");

        let principal = Principal::from_claims(&claims).unwrap();
        assert_eq!(principal.subject, id);
        assert_eq!(principal.role, Role::Patient);
    }

    #[test]
    fn test_principal_from_claims_rejects_bad_subject() {
        let now = Utc::now();
        let mut claims = SessionClaims::new(Uuid::new_v4(), Role::Patient, now, now, "x");
        claims.sub = "42".to_string();
        assert!(Principal::from_claims(&claims).is_err());
    }

    #[test]
    fn test_authorize() {
        assert!(principal(Role::Partner).authorize(&[Role::Partner]).is_ok());
        assert!(principal(Role::Patient)
            .authorize(&[Role::Patient, Role::Partner])
            .is_ok());

        match principal(Role::Patient).authorize(&[Role::Partner]) {
            Err(AppError::Forbidden(_)) => {}
            other => panic!("Expected Forbidden, got {:?}", other),
        }
    }
}
