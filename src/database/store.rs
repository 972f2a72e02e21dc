//! Storage Boundary
//!
//! Traits the services program against. Every method is a single logical
//! transaction: find-or-create sequences never observe an intermediate state,
//! whichever backend implements them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{IdentityDraft, IdentityPatch, IdentityRecord, Profile, ProfileFields};

/// Errors raised by a store implementation
#[derive(Error, Debug)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A profile write referenced an identity that does not exist
    #[error("Identity {0} does not exist")]
    MissingIdentity(Uuid),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a find-or-create write
#[derive(Debug, Clone)]
pub struct Upserted<T> {
    pub record: T,
    /// True when the write inserted a new row
    pub created: bool,
}

impl<T> Upserted<T> {
    pub fn created(record: T) -> Self {
        Self {
            record,
            created: true,
        }
    }

    pub fn existing(record: T) -> Self {
        Self {
            record,
            created: false,
        }
    }
}

/// Durable identity table keyed by (country code, phone)
///
/// Read methods only return live (not tombstoned) identities.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Find-or-create by natural key, then write a fresh code and expiry and reset
    /// `phone_verified`. Fails with `Conflict` when the natural key belongs to a
    /// tombstoned identity.
    async fn issue_otp(
        &self,
        country_code: &str,
        phone: &str,
        otp: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Upserted<IdentityRecord>>;

    /// Mark the phone verified and clear the code, but only if `otp` is still the
    /// outstanding code and has not expired at `now`. Returns None otherwise.
    async fn consume_otp(
        &self,
        id: Uuid,
        otp: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<IdentityRecord>>;

    /// Find by phone alone; overwrite the mutable fields if found, else insert.
    async fn upsert_by_phone(&self, draft: &IdentityDraft) -> StoreResult<Upserted<IdentityRecord>>;

    /// Find by phone alone, creating a minimal identity if none exists.
    async fn ensure_by_phone(
        &self,
        country_code: &str,
        phone: &str,
    ) -> StoreResult<Upserted<IdentityRecord>>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<IdentityRecord>>;

    /// Oldest live identity with this phone, across country codes
    async fn find_by_phone(&self, phone: &str) -> StoreResult<Option<IdentityRecord>>;

    async fn find_by_natural_key(
        &self,
        country_code: &str,
        phone: &str,
    ) -> StoreResult<Option<IdentityRecord>>;

    /// Phone match first, then normalized email match
    async fn find_by_identifier(&self, identifier: &str) -> StoreResult<Option<IdentityRecord>>;

    async fn list(&self, limit: i64, offset: i64) -> StoreResult<Vec<IdentityRecord>>;

    async fn update(&self, id: Uuid, patch: &IdentityPatch)
        -> StoreResult<Option<IdentityRecord>>;

    async fn set_password(&self, id: Uuid, password_hash: &str) -> StoreResult<()>;

    /// Tombstone the identity; false when no live identity had this id
    async fn soft_delete(&self, id: Uuid) -> StoreResult<bool>;

    async fn health_check(&self) -> StoreResult<()>;
}

/// Durable profile table, one row per identity
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Create the identity's profile or merge the supplied fields into it.
    /// Fails with `MissingIdentity` if `user_id` references no identity.
    async fn upsert_for_identity(
        &self,
        user_id: Uuid,
        fields: &ProfileFields,
    ) -> StoreResult<Upserted<Profile>>;

    async fn find_by_identity(&self, user_id: Uuid) -> StoreResult<Option<Profile>>;
}
