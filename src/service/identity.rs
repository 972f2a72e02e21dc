//! Identity Service
//!
//! The phone-keyed upsert plus the identity directory operations.

use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::database::{IdentityStore, Pagination};
use crate::models::{
    CreateIdentityRequest, CreateIdentityResponse, Identity, IdentityDraft, IdentityPatch,
    UpdateIdentityRequest,
};
use crate::service::require;
use crate::utils::{
    error::{AppError, AppResult},
    security::{hash_password_with_cost, mask_phone, DEFAULT_BCRYPT_COST},
    validation::normalize_email,
};

/// Identity creation, lookup, update, and removal
#[derive(Clone)]
pub struct IdentityService {
    store: Arc<dyn IdentityStore>,
    bcrypt_cost: u32,
}

impl IdentityService {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self {
            store,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }

    /// Creates a new identity service with custom bcrypt cost
    pub fn with_bcrypt_cost(store: Arc<dyn IdentityStore>, bcrypt_cost: u32) -> Self {
        Self { store, bcrypt_cost }
    }

    /// Update the identity holding this phone, or create one
    ///
    /// The lookup ignores country code; the stored country code is overwritten
    /// with the supplied one.
    pub async fn create_or_update_identity(
        &self,
        request: CreateIdentityRequest,
    ) -> AppResult<CreateIdentityResponse> {
        request.validate()?;

        let password = require(request.password, "password")?;
        let draft = IdentityDraft {
            country_code: require(request.country_code, "countryCode")?,
            phone: require(request.phone, "phone")?,
            name: require(request.name, "name")?.trim().to_string(),
            email: normalize_email(&require(request.email, "email")?),
            age: require(request.age, "age")?,
            password_hash: hash_password_with_cost(&password, self.bcrypt_cost)?,
            role: request.role,
            profile_image: request.profile_image,
        };

        let upserted = self.store.upsert_by_phone(&draft).await?;

        log::info!(
            "{} identity {} for {}",
            if upserted.created { "Created" } else { "Updated" },
            upserted.record.id,
            mask_phone(&draft.phone)
        );

        Ok(CreateIdentityResponse {
            identity: upserted.record.into(),
            created: upserted.created,
        })
    }

    pub async fn get_identity(&self, id: Uuid) -> AppResult<Identity> {
        self.store
            .find_by_id(id)
            .await?
            .map(Identity::from)
            .ok_or_else(|| not_found(id))
    }

    pub async fn list_identities(&self, pagination: Pagination) -> AppResult<Vec<Identity>> {
        let records = self
            .store
            .list(pagination.limit, pagination.offset)
            .await?;

        Ok(records.into_iter().map(Identity::from).collect())
    }

    /// Apply the supplied fields, keeping the rest
    pub async fn update_identity(
        &self,
        id: Uuid,
        request: UpdateIdentityRequest,
    ) -> AppResult<Identity> {
        request.validate()?;

        let patch = IdentityPatch {
            name: request.name.map(|name| name.trim().to_string()),
            email: request.email.as_deref().map(normalize_email),
            age: request.age,
        };

        self.store
            .update(id, &patch)
            .await?
            .map(Identity::from)
            .ok_or_else(|| not_found(id))
    }

    /// Tombstone the identity
    pub async fn delete_identity(&self, id: Uuid) -> AppResult<()> {
        if !self.store.soft_delete(id).await? {
            return Err(not_found(id));
        }

        log::info!("Deleted identity {}", id);
        Ok(())
    }

    pub async fn health_check(&self) -> AppResult<()> {
        self.store.health_check().await?;
        Ok(())
    }
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Identity {} not found", id))
}
