//! PostgreSQL Store
//!
//! Every find-or-create runs inside one transaction that first takes a
//! transaction-scoped advisory lock on the phone number, so concurrent callers
//! for the same phone queue up instead of racing to insert.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::store::{IdentityStore, ProfileStore, StoreError, StoreResult, Upserted};
use crate::models::{IdentityDraft, IdentityPatch, IdentityRecord, Profile, ProfileFields};
use crate::utils::validation::normalize_email;

const UQ_NATURAL_KEY: &str = "uq_identities_phone_country";
const UQ_EMAIL: &str = "uq_identities_email";

#[derive(sqlx::FromRow)]
struct UpsertedIdentity {
    #[sqlx(flatten)]
    record: IdentityRecord,
    inserted: bool,
}

#[derive(sqlx::FromRow)]
struct UpsertedProfile {
    #[sqlx(flatten)]
    profile: Profile,
    inserted: bool,
}

/// Identity and profile tables in PostgreSQL
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_phone(tx: &mut Transaction<'_, Postgres>, phone: &str) -> StoreResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(phone)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn live_by_phone(
        tx: &mut Transaction<'_, Postgres>,
        phone: &str,
    ) -> StoreResult<Option<IdentityRecord>> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            r#"
            SELECT * FROM identities
            WHERE phone = $1 AND deleted_at IS NULL
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(phone)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(record)
    }

    async fn insert_stub(
        tx: &mut Transaction<'_, Postgres>,
        country_code: &str,
        phone: &str,
    ) -> StoreResult<IdentityRecord> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            r#"
            INSERT INTO identities (id, country_code, phone)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(country_code)
        .bind(phone)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_write_error)?;

        Ok(record)
    }
}

/// Translate constraint violations into store conflicts
fn map_write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let message = match db_err.constraint() {
                Some(UQ_NATURAL_KEY) => "An identity with this phone number already exists",
                Some(UQ_EMAIL) => "Email address is already in use",
                _ => "Duplicate record",
            };
            return StoreError::Conflict(message.to_string());
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn issue_otp(
        &self,
        country_code: &str,
        phone: &str,
        otp: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Upserted<IdentityRecord>> {
        let mut tx = self.pool.begin().await?;
        Self::lock_phone(&mut tx, phone).await?;

        // The conditional update leaves tombstoned rows alone and returns nothing
        let row = sqlx::query_as::<_, UpsertedIdentity>(
            r#"
            INSERT INTO identities (id, country_code, phone, otp, otp_expire_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (country_code, phone) DO UPDATE
            SET otp = EXCLUDED.otp,
                otp_expire_at = EXCLUDED.otp_expire_at,
                phone_verified = FALSE,
                updated_at = NOW()
            WHERE identities.deleted_at IS NULL
            RETURNING *, (xmax = 0) AS inserted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(country_code)
        .bind(phone)
        .bind(otp)
        .bind(expires_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_write_error)?;

        let Some(row) = row else {
            return Err(StoreError::Conflict(
                "This phone number belongs to a deleted identity".to_string(),
            ));
        };

        tx.commit().await?;

        Ok(Upserted {
            record: row.record,
            created: row.inserted,
        })
    }

    async fn consume_otp(
        &self,
        id: Uuid,
        otp: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<IdentityRecord>> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            r#"
            UPDATE identities
            SET phone_verified = TRUE,
                otp = NULL,
                otp_expire_at = NULL,
                updated_at = NOW()
            WHERE id = $1
              AND otp = $2
              AND otp_expire_at >= $3
              AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(otp)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn upsert_by_phone(&self, draft: &IdentityDraft) -> StoreResult<Upserted<IdentityRecord>> {
        let mut tx = self.pool.begin().await?;
        Self::lock_phone(&mut tx, &draft.phone).await?;

        let result = match Self::live_by_phone(&mut tx, &draft.phone).await? {
            Some(existing) => {
                let record = sqlx::query_as::<_, IdentityRecord>(
                    r#"
                    UPDATE identities
                    SET country_code = $2,
                        name = $3,
                        email = $4,
                        age = $5,
                        password = $6,
                        role = COALESCE($7, role),
                        profile_image = COALESCE($8, profile_image),
                        updated_at = NOW()
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(existing.id)
                .bind(&draft.country_code)
                .bind(&draft.name)
                .bind(&draft.email)
                .bind(draft.age)
                .bind(&draft.password_hash)
                .bind(draft.role)
                .bind(&draft.profile_image)
                .fetch_one(&mut *tx)
                .await
                .map_err(map_write_error)?;

                Upserted::existing(record)
            }
            None => {
                let record = sqlx::query_as::<_, IdentityRecord>(
                    r#"
                    INSERT INTO identities
                        (id, country_code, phone, name, email, age, password, role, profile_image)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    RETURNING *
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(&draft.country_code)
                .bind(&draft.phone)
                .bind(&draft.name)
                .bind(&draft.email)
                .bind(draft.age)
                .bind(&draft.password_hash)
                .bind(draft.role.unwrap_or_default())
                .bind(&draft.profile_image)
                .fetch_one(&mut *tx)
                .await
                .map_err(map_write_error)?;

                Upserted::created(record)
            }
        };

        tx.commit().await?;
        Ok(result)
    }

    async fn ensure_by_phone(
        &self,
        country_code: &str,
        phone: &str,
    ) -> StoreResult<Upserted<IdentityRecord>> {
        let mut tx = self.pool.begin().await?;
        Self::lock_phone(&mut tx, phone).await?;

        let result = match Self::live_by_phone(&mut tx, phone).await? {
            Some(existing) => Upserted::existing(existing),
            None => Upserted::created(Self::insert_stub(&mut tx, country_code, phone).await?),
        };

        tx.commit().await?;
        Ok(result)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<IdentityRecord>> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            "SELECT * FROM identities WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_by_phone(&self, phone: &str) -> StoreResult<Option<IdentityRecord>> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            r#"
            SELECT * FROM identities
            WHERE phone = $1 AND deleted_at IS NULL
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_by_natural_key(
        &self,
        country_code: &str,
        phone: &str,
    ) -> StoreResult<Option<IdentityRecord>> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            r#"
            SELECT * FROM identities
            WHERE country_code = $1 AND phone = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(country_code)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_by_identifier(&self, identifier: &str) -> StoreResult<Option<IdentityRecord>> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            r#"
            SELECT * FROM identities
            WHERE deleted_at IS NULL AND (phone = $1 OR email = $2)
            ORDER BY (phone = $1) DESC, created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(identifier.trim())
        .bind(normalize_email(identifier))
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn list(&self, limit: i64, offset: i64) -> StoreResult<Vec<IdentityRecord>> {
        let records = sqlx::query_as::<_, IdentityRecord>(
            r#"
            SELECT * FROM identities
            WHERE deleted_at IS NULL
            ORDER BY created_at ASC, id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: &IdentityPatch,
    ) -> StoreResult<Option<IdentityRecord>> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            r#"
            UPDATE identities
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                age = COALESCE($4, age),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.email)
        .bind(patch.age)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(record)
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        sqlx::query("UPDATE identities SET password = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn soft_delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE identities
            SET deleted_at = NOW(), otp = NULL, otp_expire_at = NULL, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn upsert_for_identity(
        &self,
        user_id: Uuid,
        fields: &ProfileFields,
    ) -> StoreResult<Upserted<Profile>> {
        let row = sqlx::query_as::<_, UpsertedProfile>(
            r#"
            INSERT INTO profiles
                (id, user_id, title, gender, language, dob, service_pin,
                 service_area, about_me, experience, experience_year)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (user_id) DO UPDATE
            SET title = COALESCE(EXCLUDED.title, profiles.title),
                gender = COALESCE(EXCLUDED.gender, profiles.gender),
                language = COALESCE(EXCLUDED.language, profiles.language),
                dob = COALESCE(EXCLUDED.dob, profiles.dob),
                service_pin = COALESCE(EXCLUDED.service_pin, profiles.service_pin),
                service_area = COALESCE(EXCLUDED.service_area, profiles.service_area),
                about_me = COALESCE(EXCLUDED.about_me, profiles.about_me),
                experience = COALESCE(EXCLUDED.experience, profiles.experience),
                experience_year = COALESCE(EXCLUDED.experience_year, profiles.experience_year),
                updated_at = NOW()
            RETURNING *, (xmax = 0) AS inserted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&fields.title)
        .bind(&fields.gender)
        .bind(&fields.language)
        .bind(fields.dob)
        .bind(&fields.service_pin)
        .bind(&fields.service_area)
        .bind(&fields.about_me)
        .bind(fields.experience)
        .bind(&fields.experience_year)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                StoreError::MissingIdentity(user_id)
            }
            _ => map_write_error(err),
        })?;

        Ok(Upserted {
            record: row.profile,
            created: row.inserted,
        })
    }

    async fn find_by_identity(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        let profile =
            sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(profile)
    }
}
