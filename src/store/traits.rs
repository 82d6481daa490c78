//! Store traits consumed by the onboarding flow and the HTTP layer.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::onboarding::model::{NewProfile, ProfileRecord, ProfileUpdate, settings_keys};

/// Profile records keyed by user id.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Insert the profile row created at sign-up (`onboarding_completed = false`).
    /// Fails with `Constraint` if the user already has a profile.
    async fn create_profile(&self, profile: &NewProfile) -> Result<ProfileRecord, DatabaseError>;

    async fn get_profile(&self, user_id: &str) -> Result<Option<ProfileRecord>, DatabaseError>;

    /// Insert or update the profile. The store assigns `updated_at`.
    /// Returns `None` without writing if the stored profile is already
    /// onboarded.
    async fn upsert_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Option<ProfileRecord>, DatabaseError>;

    /// Clear the completed marker so onboarding can run again.
    /// Returns false if no profile exists.
    async fn reset_onboarding(&self, user_id: &str) -> Result<bool, DatabaseError>;
}

/// Per-user JSON settings, plus boolean feature flags stored on top of them.
#[async_trait]
pub trait FlagStore: Send + Sync {
    async fn get_setting(
        &self,
        user_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, DatabaseError>;

    async fn set_setting(
        &self,
        user_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), DatabaseError>;

    async fn delete_setting(&self, user_id: &str, key: &str) -> Result<bool, DatabaseError>;

    /// Read a feature flag. Unset flags are false.
    async fn get_flag(&self, user_id: &str, name: &str) -> Result<bool, DatabaseError> {
        let key = format!("{}{name}", settings_keys::FLAG_PREFIX);
        Ok(self
            .get_setting(user_id, &key)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn set_flag(&self, user_id: &str, name: &str, value: bool) -> Result<(), DatabaseError> {
        let key = format!("{}{name}", settings_keys::FLAG_PREFIX);
        self.set_setting(user_id, &key, &serde_json::Value::Bool(value))
            .await
    }
}
