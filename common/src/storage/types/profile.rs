use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

// One record per user, keyed by the user id. Written by the account surface,
// never by this pipeline.
stored_object!(Profile, "profile", {
    nickname: Option<String>,
    age: Option<u32>,
    gender: Option<String>,
    height: Option<f32>,
    height_unit: Option<String>,
    weight: Option<f32>,
    weight_unit: Option<String>,
    bio: Option<String>,
    avatar_url: Option<String>
});

impl Profile {
    pub fn new(user_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: user_id,
            created_at: now,
            updated_at: now,
            nickname: None,
            age: None,
            gender: None,
            height: None,
            height_unit: None,
            weight: None,
            weight_unit: None,
            bio: None,
            avatar_url: None,
        }
    }

    /// A missing profile is a normal state, the pipeline proceeds without one.
    pub async fn find_by_user_id(
        user_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Option<Self>, AppError> {
        let profile: Option<Self> = db.get_item(user_id).await?;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_absent_profile_is_none() {
        let namespace = "test_ns";
        let database = &uuid::Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory(namespace, database)
            .await
            .expect("Failed to start in-memory surrealdb");

        let found = Profile::find_by_user_id("missing_user", &db)
            .await
            .expect("Lookup failed");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_store_and_find_profile() {
        let namespace = "test_ns";
        let database = &uuid::Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory(namespace, database)
            .await
            .expect("Failed to start in-memory surrealdb");

        let profile = Profile {
            nickname: Some("Alex".to_string()),
            age: Some(32),
            height: Some(180.0),
            height_unit: Some("cm".to_string()),
            ..Profile::new("user_1".to_string())
        };

        db.store_item(profile.clone())
            .await
            .expect("Failed to store profile");

        let found = Profile::find_by_user_id("user_1", &db)
            .await
            .expect("Lookup failed")
            .expect("Profile missing");

        assert_eq!(found.id, "user_1");
        assert_eq!(found.nickname.as_deref(), Some("Alex"));
        assert_eq!(found.age, Some(32));
        assert_eq!(found.gender, None);
        assert_eq!(found.height_unit.as_deref(), Some("cm"));
    }
}
