//! In-Memory Store
//!
//! Process-local implementation of both store traits, used by the test suite
//! and by the server when no database is configured. A single mutex guards all
//! state so each trait method is atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::store::{IdentityStore, ProfileStore, StoreError, StoreResult, Upserted};
use crate::models::{IdentityDraft, IdentityPatch, IdentityRecord, Profile, ProfileFields};
use crate::utils::validation::normalize_email;

#[derive(Default)]
struct MemoryState {
    identities: HashMap<Uuid, IdentityRecord>,
    /// Keyed by owning identity
    profiles: HashMap<Uuid, Profile>,
}

impl MemoryState {
    fn live(&self) -> impl Iterator<Item = &IdentityRecord> {
        self.identities.values().filter(|record| !record.is_deleted())
    }

    fn live_by_phone(&self, phone: &str) -> Option<&IdentityRecord> {
        self.live()
            .filter(|record| record.phone == phone)
            .min_by_key(|record| (record.created_at, record.id))
    }

    /// Natural key lookup that also sees tombstoned rows
    fn any_by_natural_key(&self, country_code: &str, phone: &str) -> Option<&IdentityRecord> {
        self.identities
            .values()
            .find(|record| record.country_code == country_code && record.phone == phone)
    }

    fn check_unique(&self, candidate: &IdentityRecord) -> StoreResult<()> {
        let clash = self.identities.values().any(|other| {
            other.id != candidate.id
                && other.country_code == candidate.country_code
                && other.phone == candidate.phone
        });
        if clash {
            return Err(StoreError::Conflict(
                "An identity with this phone number already exists".to_string(),
            ));
        }

        if let Some(email) = &candidate.email {
            let taken = self
                .live()
                .any(|other| other.id != candidate.id && other.email.as_ref() == Some(email));
            if taken {
                return Err(StoreError::Conflict(
                    "Email address is already in use".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Validate and store a row, returning the stored copy
    fn put(&mut self, record: IdentityRecord) -> StoreResult<IdentityRecord> {
        self.check_unique(&record)?;
        self.identities.insert(record.id, record.clone());
        Ok(record)
    }
}

/// Identity and profile tables held in process memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn issue_otp(
        &self,
        country_code: &str,
        phone: &str,
        otp: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Upserted<IdentityRecord>> {
        let mut state = self.state.lock().await;

        let (mut record, created) = match state.any_by_natural_key(country_code, phone) {
            Some(existing) if existing.is_deleted() => {
                return Err(StoreError::Conflict(
                    "This phone number belongs to a deleted identity".to_string(),
                ));
            }
            Some(existing) => (existing.clone(), false),
            None => (IdentityRecord::stub(country_code, phone), true),
        };

        record.otp = Some(otp.to_string());
        record.otp_expire_at = Some(expires_at);
        record.phone_verified = false;
        if !created {
            record.updated_at = Utc::now();
        }

        let record = state.put(record)?;
        Ok(Upserted { record, created })
    }

    async fn consume_otp(
        &self,
        id: Uuid,
        otp: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<IdentityRecord>> {
        let mut state = self.state.lock().await;

        let Some(record) = state.identities.get_mut(&id) else {
            return Ok(None);
        };

        let matches = !record.is_deleted()
            && record.otp.as_deref() == Some(otp)
            && record.otp_expire_at.is_some_and(|expiry| expiry >= now);
        if !matches {
            return Ok(None);
        }

        record.phone_verified = true;
        record.otp = None;
        record.otp_expire_at = None;
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn upsert_by_phone(&self, draft: &IdentityDraft) -> StoreResult<Upserted<IdentityRecord>> {
        let mut state = self.state.lock().await;

        match state.live_by_phone(&draft.phone).cloned() {
            Some(mut existing) => {
                existing.apply_draft(draft);
                Ok(Upserted::existing(state.put(existing)?))
            }
            None => Ok(Upserted::created(state.put(draft.clone().into_record())?)),
        }
    }

    async fn ensure_by_phone(
        &self,
        country_code: &str,
        phone: &str,
    ) -> StoreResult<Upserted<IdentityRecord>> {
        let mut state = self.state.lock().await;

        match state.live_by_phone(phone).cloned() {
            Some(existing) => Ok(Upserted::existing(existing)),
            None => Ok(Upserted::created(
                state.put(IdentityRecord::stub(country_code, phone))?,
            )),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<IdentityRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .identities
            .get(&id)
            .filter(|record| !record.is_deleted())
            .cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> StoreResult<Option<IdentityRecord>> {
        let state = self.state.lock().await;
        Ok(state.live_by_phone(phone).cloned())
    }

    async fn find_by_natural_key(
        &self,
        country_code: &str,
        phone: &str,
    ) -> StoreResult<Option<IdentityRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .any_by_natural_key(country_code, phone)
            .filter(|record| !record.is_deleted())
            .cloned())
    }

    async fn find_by_identifier(&self, identifier: &str) -> StoreResult<Option<IdentityRecord>> {
        let state = self.state.lock().await;

        if let Some(record) = state.live_by_phone(identifier.trim()) {
            return Ok(Some(record.clone()));
        }

        let email = normalize_email(identifier);
        Ok(state
            .live()
            .filter(|record| record.email.as_deref() == Some(email.as_str()))
            .min_by_key(|record| (record.created_at, record.id))
            .cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> StoreResult<Vec<IdentityRecord>> {
        let state = self.state.lock().await;

        let mut records: Vec<IdentityRecord> = state.live().cloned().collect();
        records.sort_by_key(|record| (record.created_at, record.id));

        Ok(records
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn update(
        &self,
        id: Uuid,
        patch: &IdentityPatch,
    ) -> StoreResult<Option<IdentityRecord>> {
        let mut state = self.state.lock().await;

        let Some(mut record) = state
            .identities
            .get(&id)
            .filter(|record| !record.is_deleted())
            .cloned()
        else {
            return Ok(None);
        };

        record.apply_patch(patch);
        Ok(Some(state.put(record)?))
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;

        if let Some(record) = state.identities.get_mut(&id) {
            record.password = Some(password_hash.to_string());
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;

        match state.identities.get_mut(&id) {
            Some(record) if !record.is_deleted() => {
                let now = Utc::now();
                record.deleted_at = Some(now);
                record.otp = None;
                record.otp_expire_at = None;
                record.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn upsert_for_identity(
        &self,
        user_id: Uuid,
        fields: &ProfileFields,
    ) -> StoreResult<Upserted<Profile>> {
        let mut state = self.state.lock().await;

        if !state.identities.contains_key(&user_id) {
            return Err(StoreError::MissingIdentity(user_id));
        }

        if let Some(profile) = state.profiles.get_mut(&user_id) {
            profile.merge(fields.clone());
            return Ok(Upserted::existing(profile.clone()));
        }

        let profile = Profile::create(user_id, fields.clone());
        state.profiles.insert(user_id, profile.clone());
        Ok(Upserted::created(profile))
    }

    async fn find_by_identity(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        let state = self.state.lock().await;
        Ok(state.profiles.get(&user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use std::sync::Arc;

    fn expiry() -> DateTime<Utc> {
        Utc::now() + chrono::Duration::minutes(5)
    }

    fn draft(phone: &str, email: &str) -> IdentityDraft {
        IdentityDraft {
            country_code: "+91".to_string(),
            phone: phone.to_string(),
            name: "Asha Rao".to_string(),
            email: email.to_string(),
            age: 31,
            password_hash: "digest".to_string(),
            role: None,
            profile_image: None,
        }
    }

    #[tokio::test]
    async fn test_issue_otp_find_or_create() {
        let store = MemoryStore::new();

        let first = store.issue_otp("+91", "9876543210", "111111", expiry()).await.unwrap();
        assert!(first.created);
        assert_eq!(first.record.otp.as_deref(), Some("111111"));

        let second = store.issue_otp("+91", "9876543210", "222222", expiry()).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.record.id, first.record.id);
        assert_eq!(second.record.otp.as_deref(), Some("222222"));
    }

    #[tokio::test]
    async fn test_concurrent_issue_otp_creates_one_identity() {
        let store = Arc::new(MemoryStore::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .issue_otp("+91", "9876543210", &format!("{:06}", i), expiry())
                        .await
                })
            })
            .collect();

        let mut created = 0;
        let mut ids = Vec::new();
        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            if result.created {
                created += 1;
            }
            ids.push(result.record.id);
        }

        assert_eq!(created, 1);
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(store.list(100, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_issue_otp_resets_verification() {
        let store = MemoryStore::new();
        let issued = store.issue_otp("+91", "9876543210", "111111", expiry()).await.unwrap();
        store.consume_otp(issued.record.id, "111111", Utc::now()).await.unwrap();

        let reissued = store.issue_otp("+91", "9876543210", "222222", expiry()).await.unwrap();
        assert!(!reissued.record.phone_verified);
    }

    #[tokio::test]
    async fn test_consume_otp_checks_code_and_expiry() {
        let store = MemoryStore::new();
        let issued = store.issue_otp("+91", "9876543210", "111111", expiry()).await.unwrap();
        let id = issued.record.id;

        assert!(store.consume_otp(id, "999999", Utc::now()).await.unwrap().is_none());

        let late = Utc::now() + chrono::Duration::minutes(10);
        assert!(store.consume_otp(id, "111111", late).await.unwrap().is_none());

        let verified = store.consume_otp(id, "111111", Utc::now()).await.unwrap().unwrap();
        assert!(verified.phone_verified);
        assert!(verified.otp.is_none());
        assert!(verified.otp_expire_at.is_none());

        assert!(store.consume_otp(id, "111111", Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_by_phone_ignores_country_code_for_lookup() {
        let store = MemoryStore::new();
        let stub = store.ensure_by_phone("+1", "9876543210").await.unwrap();
        assert!(stub.created);

        let mut partner = draft("9876543210", "asha@example.com");
        partner.role = Some(Role::Partner);
        let updated = store.upsert_by_phone(&partner).await.unwrap();

        assert!(!updated.created);
        assert_eq!(updated.record.id, stub.record.id);
        assert_eq!(updated.record.country_code, "+91");
        assert_eq!(updated.record.role, Role::Partner);

        let again = store
            .upsert_by_phone(&draft("9876543210", "asha@example.com"))
            .await
            .unwrap();
        assert_eq!(again.record.role, Role::Partner);
    }

    #[tokio::test]
    async fn test_upsert_rejects_duplicate_email() {
        let store = MemoryStore::new();
        store.upsert_by_phone(&draft("9876543210", "asha@example.com")).await.unwrap();

        let result = store.upsert_by_phone(&draft("9876543211", "asha@example.com")).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_find_by_phone_returns_oldest() {
        let store = MemoryStore::new();
        let first = store.issue_otp("+91", "9876543210", "111111", expiry()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.issue_otp("+1", "9876543210", "222222", expiry()).await.unwrap();

        let found = store.find_by_phone("9876543210").await.unwrap().unwrap();
        assert_eq!(found.id, first.record.id);
    }

    #[tokio::test]
    async fn test_find_by_identifier_prefers_phone() {
        let store = MemoryStore::new();
        let created = store
            .upsert_by_phone(&draft("9876543210", "asha@example.com"))
            .await
            .unwrap();

        let by_phone = store.find_by_identifier("9876543210").await.unwrap().unwrap();
        assert_eq!(by_phone.id, created.record.id);

        let by_email = store.find_by_identifier(" ASHA@example.com ").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.record.id);

        assert!(store.find_by_identifier("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_soft_delete_hides_and_blocks_reuse() {
        let store = MemoryStore::new();
        let issued = store.issue_otp("+91", "9876543210", "111111", expiry()).await.unwrap();
        let id = issued.record.id;

        assert!(store.soft_delete(id).await.unwrap());
        assert!(!store.soft_delete(id).await.unwrap());
        assert!(store.find_by_id(id).await.unwrap().is_none());
        assert!(store.list(10, 0).await.unwrap().is_empty());

        let result = store.issue_otp("+91", "9876543210", "222222", expiry()).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        let result = store.ensure_by_phone("+91", "9876543210").await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_partial() {
        let store = MemoryStore::new();
        let created = store
            .upsert_by_phone(&draft("9876543210", "asha@example.com"))
            .await
            .unwrap();

        let updated = store
            .update(
                created.record.id,
                &IdentityPatch {
                    age: Some(32),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.age, Some(32));
        assert_eq!(updated.name.as_deref(), Some("Asha Rao"));

        assert!(store
            .update(Uuid::new_v4(), &IdentityPatch::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .ensure_by_phone("+91", &format!("98765432{:02}", i))
                .await
                .unwrap();
        }

        assert_eq!(store.list(2, 0).await.unwrap().len(), 2);
        assert_eq!(store.list(2, 4).await.unwrap().len(), 1);
        assert!(store.list(2, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_profile_upsert_one_per_identity() {
        let store = MemoryStore::new();
        let identity = store.ensure_by_phone("+91", "9876543210").await.unwrap().record;

        let first = store
            .upsert_for_identity(
                identity.id,
                &ProfileFields {
                    title: Some("Dr".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(first.created);

        let second = store
            .upsert_for_identity(
                identity.id,
                &ProfileFields {
                    gender: Some("female".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.record.id, first.record.id);
        assert_eq!(second.record.title.as_deref(), Some("Dr"));
        assert_eq!(second.record.gender.as_deref(), Some("female"));
    }

    #[tokio::test]
    async fn test_profile_requires_identity() {
        let store = MemoryStore::new();
        let missing = Uuid::new_v4();

        let result = store.upsert_for_identity(missing, &ProfileFields::default()).await;
        assert!(matches!(result, Err(StoreError::MissingIdentity(id)) if id == missing));
    }
}
