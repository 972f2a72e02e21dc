//! Profile Service
//!
//! Links extended profile attributes to the identity that owns a phone.

use std::sync::Arc;
use validator::Validate;

use crate::database::{IdentityStore, ProfileStore};
use crate::models::{
    IdentityRecord, RegisterProfileRequest, RegisterProfileResponse, DEFAULT_COUNTRY_CODE,
};
use crate::service::require;
use crate::utils::{
    error::{AppError, AppResult},
    security::mask_phone,
};

#[derive(Clone)]
pub struct ProfileService {
    identities: Arc<dyn IdentityStore>,
    profiles: Arc<dyn ProfileStore>,
    require_verified_phone: bool,
}

impl ProfileService {
    pub fn new(identities: Arc<dyn IdentityStore>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self {
            identities,
            profiles,
            require_verified_phone: false,
        }
    }

    /// Only allow registration for identities whose phone is verified
    pub fn require_verified_phone(mut self, required: bool) -> Self {
        self.require_verified_phone = required;
        self
    }

    /// Resolve or create the identity for the phone, then create or merge its profile
    pub async fn register_profile(
        &self,
        request: RegisterProfileRequest,
    ) -> AppResult<RegisterProfileResponse> {
        request.validate()?;
        let fields = request.profile_fields();
        let phone = require(request.phone, "phone")?;
        let country_code = request
            .country_code
            .unwrap_or_else(|| DEFAULT_COUNTRY_CODE.to_string());

        let identity = self.resolve_identity(&country_code, &phone).await?;
        let upserted = self
            .profiles
            .upsert_for_identity(identity.id, &fields)
            .await?;

        log::info!(
            "{} profile {} for identity {}",
            if upserted.created { "Created" } else { "Updated" },
            upserted.record.id,
            identity.id
        );

        Ok(RegisterProfileResponse {
            identity: identity.into(),
            profile: upserted.record,
            profile_created: upserted.created,
        })
    }

    async fn resolve_identity(&self, country_code: &str, phone: &str) -> AppResult<IdentityRecord> {
        if self.require_verified_phone {
            return match self.identities.find_by_phone(phone).await? {
                Some(record) if record.phone_verified => Ok(record),
                _ => {
                    log::warn!(
                        "Profile registration refused for unverified phone {}",
                        mask_phone(phone)
                    );
                    Err(AppError::Forbidden(
                        "Phone number must be verified before registering a profile".to_string(),
                    ))
                }
            };
        }

        let ensured = self.identities.ensure_by_phone(country_code, phone).await?;
        if ensured.created {
            log::info!(
                "Created identity {} for {} during profile registration",
                ensured.record.id,
                mask_phone(phone)
            );
        }
        Ok(ensured.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use chrono::{Duration, Utc};

    fn service(store: &Arc<MemoryStore>) -> ProfileService {
        ProfileService::new(store.clone(), store.clone())
    }

    fn request(title: &str) -> RegisterProfileRequest {
        RegisterProfileRequest {
            phone: Some("9876543210".to_string()),
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_register_twice_updates_in_place() {
        let store = Arc::new(MemoryStore::new());
        let service = service(&store);

        let first = service.register_profile(request("Dr")).await.unwrap();
        assert!(first.profile_created);
        assert_eq!(first.identity.country_code, DEFAULT_COUNTRY_CODE);

        let second = service.register_profile(request("Prof")).await.unwrap();
        assert!(!second.profile_created);
        assert_eq!(second.identity.id, first.identity.id);
        assert_eq!(second.profile.id, first.profile.id);
        assert_eq!(second.profile.title.as_deref(), Some("Prof"));

        let stored = store.find_by_identity(first.identity.id).await.unwrap().unwrap();
        assert_eq!(stored.title.as_deref(), Some("Prof"));
    }

    #[tokio::test]
    async fn test_concurrent_registration_links_one_identity_and_profile() {
        let store = Arc::new(MemoryStore::new());
        let service = service(&store);

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let service = service.clone();
                let title = format!("T{}", i);
                tokio::spawn(async move { service.register_profile(request(&title)).await })
            })
            .collect();

        let mut created = 0;
        let mut identity_ids = Vec::new();
        for handle in handles {
            let response = handle.await.unwrap().unwrap();
            if response.profile_created {
                created += 1;
            }
            identity_ids.push(response.identity.id);
        }

        assert_eq!(created, 1);
        identity_ids.dedup();
        assert_eq!(identity_ids.len(), 1);
        assert_eq!(store.list(100, 0).await.unwrap().len(), 1);
        assert!(store.find_by_identity(identity_ids[0]).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_omitted_fields_are_kept() {
        let store = Arc::new(MemoryStore::new());
        let service = service(&store);

        let mut first = request("Dr");
        first.service_area = Some("Indiranagar".to_string());
        service.register_profile(first).await.unwrap();

        let second = RegisterProfileRequest {
            phone: Some("9876543210".to_string()),
            experience: Some(9),
            ..Default::default()
        };
        let result = service.register_profile(second).await.unwrap();

        assert_eq!(result.profile.title.as_deref(), Some("Dr"));
        assert_eq!(result.profile.service_area.as_deref(), Some("Indiranagar"));
        assert_eq!(result.profile.experience, Some(9));
    }

    #[tokio::test]
    async fn test_links_existing_identity_by_phone() {
        let store = Arc::new(MemoryStore::new());
        let expires = Utc::now() + Duration::minutes(5);
        let existing = store
            .issue_otp("+91", "9876543210", "123456", expires)
            .await
            .unwrap()
            .record;

        let result = service(&store).register_profile(request("Dr")).await.unwrap();
        assert_eq!(result.identity.id, existing.id);
        assert_eq!(result.identity.country_code, "+91");
    }

    #[tokio::test]
    async fn test_verified_phone_required() {
        let store = Arc::new(MemoryStore::new());
        let service = service(&store).require_verified_phone(true);

        let result = service.register_profile(request("Dr")).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert!(store.find_by_phone("9876543210").await.unwrap().is_none());

        let expires = Utc::now() + Duration::minutes(5);
        let issued = store
            .issue_otp("+1", "9876543210", "123456", expires)
            .await
            .unwrap()
            .record;
        let result = service.register_profile(request("Dr")).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        store.consume_otp(issued.id, "123456", Utc::now()).await.unwrap();
        let result = service.register_profile(request("Dr")).await.unwrap();
        assert_eq!(result.identity.id, issued.id);
        assert!(result.identity.phone_verified);
    }

    #[tokio::test]
    async fn test_phone_is_required() {
        let store = Arc::new(MemoryStore::new());
        let result = service(&store)
            .register_profile(RegisterProfileRequest::default())
            .await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
