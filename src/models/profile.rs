//! Profile Model
//!
//! Extended attributes owned one-to-one by an identity.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored profile row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    /// Owning identity; enforced by the store
    pub user_id: Uuid,
    pub title: Option<String>,
    pub gender: Option<String>,
    pub language: Option<String>,
    pub dob: Option<NaiveDate>,
    pub service_pin: Option<String>,
    pub service_area: Option<String>,
    pub about_me: Option<String>,
    pub experience: Option<i32>,
    pub experience_year: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Enrichment fields supplied by a profile registration
///
/// `None` means "not supplied": on create the column stays null, on update the
/// stored value is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileFields {
    pub title: Option<String>,
    pub gender: Option<String>,
    pub language: Option<String>,
    pub dob: Option<NaiveDate>,
    pub service_pin: Option<String>,
    pub service_area: Option<String>,
    pub about_me: Option<String>,
    pub experience: Option<i32>,
    pub experience_year: Option<String>,
}

impl Profile {
    pub fn create(user_id: Uuid, fields: ProfileFields) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: fields.title,
            gender: fields.gender,
            language: fields.language,
            dob: fields.dob,
            service_pin: fields.service_pin,
            service_area: fields.service_area,
            about_me: fields.about_me,
            experience: fields.experience,
            experience_year: fields.experience_year,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite every supplied field in place
    pub fn merge(&mut self, fields: ProfileFields) {
        fn keep_or<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        keep_or(&mut self.title, fields.title);
        keep_or(&mut self.gender, fields.gender);
        keep_or(&mut self.language, fields.language);
        keep_or(&mut self.dob, fields.dob);
        keep_or(&mut self.service_pin, fields.service_pin);
        keep_or(&mut self.service_area, fields.service_area);
        keep_or(&mut self.about_me, fields.about_me);
        keep_or(&mut self.experience, fields.experience);
        keep_or(&mut self.experience_year, fields.experience_year);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overwrites_supplied_and_keeps_omitted() {
        let mut profile = Profile::create(
            Uuid::new_v4(),
            ProfileFields {
                title: Some("Dr".to_string()),
                gender: Some("female".to_string()),
                experience: Some(4),
                ..Default::default()
            },
        );
        let created_at = profile.created_at;
        let id = profile.id;

        profile.merge(ProfileFields {
            title: Some("Prof".to_string()),
            about_me: Some("Physiotherapist".to_string()),
            ..Default::default()
        });

        assert_eq!(profile.id, id);
        assert_eq!(profile.created_at, created_at);
        assert_eq!(profile.title.as_deref(), Some("Prof"));
        assert_eq!(profile.gender.as_deref(), Some("female"));
        assert_eq!(profile.experience, Some(4));
        assert_eq!(profile.about_me.as_deref(), Some("Physiotherapist"));
    }

    #[test]
    fn test_profile_serializes_camel_case() {
        let profile = Profile::create(
            Uuid::new_v4(),
            ProfileFields {
                service_pin: Some("560001".to_string()),
                dob: NaiveDate::from_ymd_opt(1990, 4, 12),
                ..Default::default()
            },
        );
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["servicePin"], "560001");
        assert_eq!(json["dob"], "1990-04-12");
        assert!(json.get("userId").is_some());
    }
}
