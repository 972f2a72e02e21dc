//! Identity Model
//!
//! Phone-keyed identity records and the role enum carried in session tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Country code stored when a write path does not supply one
pub const DEFAULT_COUNTRY_CODE: &str = "+1";

/// Marketplace role of an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "identity_role", rename_all = "lowercase")]
pub enum Role {
    #[default]
    Patient,
    Partner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Partner => "partner",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity representation for external API responses
///
/// Credential material and outstanding OTP codes are never part of this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: Uuid,
    pub country_code: String,
    pub phone: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i32>,
    /// Stored filename of the uploaded profile image
    pub profile_image: Option<String>,
    pub role: Role,
    pub phone_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full stored identity row including credential and OTP state
///
/// Only the store and the services see this struct.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IdentityRecord {
    pub id: Uuid,
    pub country_code: String,
    pub phone: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i32>,
    pub profile_image: Option<String>,
    /// bcrypt digest, or a legacy plaintext value awaiting upgrade; None for OTP stubs
    pub password: Option<String>,
    pub role: Role,
    pub otp: Option<String>,
    pub otp_expire_at: Option<DateTime<Utc>>,
    pub phone_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl IdentityRecord {
    /// Minimal record for a phone seen for the first time
    pub fn stub(country_code: &str, phone: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            country_code: country_code.to_string(),
            phone: phone.to_string(),
            name: None,
            email: None,
            age: None,
            profile_image: None,
            password: None,
            role: Role::Patient,
            otp: None,
            otp_expire_at: None,
            phone_verified: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Apply the mutable fields of an upsert onto an existing row
    pub fn apply_draft(&mut self, draft: &IdentityDraft) {
        self.country_code = draft.country_code.clone();
        self.name = Some(draft.name.clone());
        self.email = Some(draft.email.clone());
        self.age = Some(draft.age);
        self.password = Some(draft.password_hash.clone());
        if let Some(role) = draft.role {
            self.role = role;
        }
        if draft.profile_image.is_some() {
            self.profile_image = draft.profile_image.clone();
        }
        self.updated_at = Utc::now();
    }

    /// Apply a partial update, leaving omitted fields untouched
    pub fn apply_patch(&mut self, patch: &IdentityPatch) {
        if let Some(name) = &patch.name {
            self.name = Some(name.clone());
        }
        if let Some(email) = &patch.email {
            self.email = Some(email.clone());
        }
        if let Some(age) = patch.age {
            self.age = Some(age);
        }
        self.updated_at = Utc::now();
    }
}

impl From<IdentityRecord> for Identity {
    fn from(record: IdentityRecord) -> Self {
        Identity {
            id: record.id,
            country_code: record.country_code,
            phone: record.phone,
            name: record.name,
            email: record.email,
            age: record.age,
            profile_image: record.profile_image,
            role: record.role,
            phone_verified: record.phone_verified,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Validated, store-ready input for the phone-keyed upsert
#[derive(Debug, Clone)]
pub struct IdentityDraft {
    pub country_code: String,
    pub phone: String,
    pub name: String,
    /// Already normalized
    pub email: String,
    pub age: i32,
    pub password_hash: String,
    /// None keeps the stored role on update and defaults to patient on create
    pub role: Option<Role>,
    pub profile_image: Option<String>,
}

impl IdentityDraft {
    pub fn into_record(self) -> IdentityRecord {
        let mut record = IdentityRecord::stub(&self.country_code, &self.phone);
        record.name = Some(self.name);
        record.email = Some(self.email);
        record.age = Some(self.age);
        record.password = Some(self.password_hash);
        record.role = self.role.unwrap_or_default();
        record.profile_image = self.profile_image;
        record
    }
}

/// Partial identity update
#[derive(Debug, Clone, Default)]
pub struct IdentityPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> IdentityDraft {
        IdentityDraft {
            country_code: "+91".to_string(),
            phone: "9876543210".to_string(),
            name: "Asha Rao".to_string(),
            email: "asha@example.com".to_string(),
            age: 31,
            password_hash: "digest".to_string(),
            role: None,
            profile_image: None,
        }
    }

    #[test]
    fn test_identity_conversion_strips_secrets() {
        let mut record = IdentityRecord::stub("+91", "9876543210");
        record.password = Some("digest".to_string());
        record.otp = Some("123456".to_string());

        let identity: Identity = record.clone().into();
        assert_eq!(identity.id, record.id);
        assert_eq!(identity.phone, "9876543210");

        let json = serde_json::to_value(&identity).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("otp").is_none());
        assert_eq!(json["countryCode"], "+91");
        assert_eq!(json["role"], "patient");
    }

    #[test]
    fn test_stub_defaults() {
        let record = IdentityRecord::stub("+91", "9876543210");
        assert_eq!(record.role, Role::Patient);
        assert!(record.password.is_none());
        assert!(!record.phone_verified);
        assert!(record.otp.is_none());
    }

    #[test]
    fn test_apply_draft_retains_role_when_absent() {
        let mut record = IdentityRecord::stub("+1", "9876543210");
        record.role = Role::Partner;
        record.profile_image = Some("old.png".to_string());

        record.apply_draft(&draft());

        assert_eq!(record.role, Role::Partner);
        assert_eq!(record.country_code, "+91");
        assert_eq!(record.profile_image.as_deref(), Some("old.png"));
        assert_eq!(record.password.as_deref(), Some("digest"));
    }

    #[test]
    fn test_apply_draft_overrides_role_when_supplied() {
        let mut record = IdentityRecord::stub("+91", "9876543210");
        let mut d = draft();
        d.role = Some(Role::Partner);
        record.apply_draft(&d);
        assert_eq!(record.role, Role::Partner);
    }

    #[test]
    fn test_draft_into_record_defaults_to_patient() {
        let record = draft().into_record();
        assert_eq!(record.role, Role::Patient);
        assert_eq!(record.name.as_deref(), Some("Asha Rao"));
    }

    #[test]
    fn test_apply_patch_partial() {
        let mut record = draft().into_record();
        record.apply_patch(&IdentityPatch {
            name: Some("Asha R".to_string()),
            ..Default::default()
        });
        assert_eq!(record.name.as_deref(), Some("Asha R"));
        assert_eq!(record.email.as_deref(), Some("asha@example.com"));
        assert_eq!(record.age, Some(31));
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Partner).unwrap(), "\"partner\"");
        let role: Role = serde_json::from_str("\"patient\"").unwrap();
        assert_eq!(role, Role::Patient);
    }
}
