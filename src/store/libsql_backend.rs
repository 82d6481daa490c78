//! libSQL backend: async store implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::onboarding::model::{NewProfile, ProfileRecord, ProfileUpdate, Role};
use crate::store::migrations;
use crate::store::traits::{FlagStore, ProfileStore};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    pub async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(column: &str, s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| chrono::NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|ndt| ndt.and_utc())
        .ok_or_else(|| DatabaseError::Serialization(format!("profile {column}: bad timestamp {s:?}")))
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

const PROFILE_COLUMNS: &str = "user_id, email, name, phone, location, bio, company, industry, role, onboarding_completed, created_at, updated_at";

/// Map a libsql Row to a ProfileRecord. Column order matches PROFILE_COLUMNS.
fn row_to_profile(row: &libsql::Row) -> Result<ProfileRecord, DatabaseError> {
    let role_str: String = row
        .get(8)
        .map_err(|e| DatabaseError::Query(format!("profile role: {e}")))?;
    let role: Role = role_str.parse().map_err(DatabaseError::Serialization)?;
    let created_str: String = row
        .get(10)
        .map_err(|e| DatabaseError::Query(format!("profile created_at: {e}")))?;
    let updated_str: String = row
        .get(11)
        .map_err(|e| DatabaseError::Query(format!("profile updated_at: {e}")))?;

    Ok(ProfileRecord {
        user_id: row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("profile user_id: {e}")))?,
        email: row.get::<String>(1).unwrap_or_default(),
        name: row.get::<String>(2).unwrap_or_default(),
        phone: row.get::<String>(3).ok(),
        location: row.get::<String>(4).ok(),
        bio: row.get::<String>(5).ok(),
        company: row.get::<String>(6).ok(),
        industry: row
            .get::<String>(7)
            .ok()
            .and_then(|s| s.parse().ok()),
        role,
        onboarding_completed: row.get::<i64>(9).unwrap_or(0) != 0,
        created_at: parse_datetime("created_at", &created_str)?,
        updated_at: parse_datetime("updated_at", &updated_str)?,
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl ProfileStore for LibSqlBackend {
    async fn create_profile(&self, profile: &NewProfile) -> Result<ProfileRecord, DatabaseError> {
        if self.get_profile(&profile.user_id).await?.is_some() {
            return Err(DatabaseError::Constraint(format!(
                "profile already exists for user {}",
                profile.user_id
            )));
        }

        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO profiles (user_id, email, name, role, onboarding_completed, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
                params![
                    profile.user_id.as_str(),
                    profile.email.as_str(),
                    profile.name.as_str(),
                    profile.role.as_str(),
                    now,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_profile: {e}")))?;

        debug!(user_id = %profile.user_id, role = %profile.role, "Profile created");
        self.get_profile(&profile.user_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "profile".to_string(),
                id: profile.user_id.clone(),
            })
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<ProfileRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ?1"),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_profile: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_profile(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_profile: {e}"))),
        }
    }

    async fn upsert_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Option<ProfileRecord>, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let industry = update.industry.map(|i| i.as_str());

        let written = self
            .conn()
            .execute(
                "INSERT INTO profiles (user_id, name, phone, location, bio, company, industry, role, onboarding_completed, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
                 ON CONFLICT (user_id) DO UPDATE SET
                    name = ?2, phone = ?3, location = ?4, bio = ?5, company = ?6,
                    industry = ?7, onboarding_completed = ?9, updated_at = ?10
                 WHERE profiles.onboarding_completed = 0",
                params![
                    user_id,
                    update.name.as_str(),
                    update.phone.as_str(),
                    update.location.as_str(),
                    update.bio.as_str(),
                    opt_text(update.company.as_deref()),
                    opt_text(industry),
                    update.role.as_str(),
                    i64::from(update.onboarding_completed),
                    now,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_profile: {e}")))?;

        if written == 0 {
            debug!(user_id = %user_id, "Profile already onboarded; upsert skipped");
            return Ok(None);
        }

        debug!(user_id = %user_id, completed = update.onboarding_completed, "Profile upserted");
        self.get_profile(user_id)
            .await?
            .map(Some)
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "profile".to_string(),
                id: user_id.to_string(),
            })
    }

    async fn reset_onboarding(&self, user_id: &str) -> Result<bool, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let count = self
            .conn()
            .execute(
                "UPDATE profiles SET onboarding_completed = 0, updated_at = ?1 WHERE user_id = ?2",
                params![now, user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("reset_onboarding: {e}")))?;
        Ok(count > 0)
    }
}

#[async_trait]
impl FlagStore for LibSqlBackend {
    async fn get_setting(
        &self,
        user_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT value FROM settings WHERE user_id = ?1 AND key = ?2",
                params![user_id, key],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_setting: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let value_str: String = row.get(0).unwrap_or_else(|_| "null".to_string());
                let value: serde_json::Value =
                    serde_json::from_str(&value_str).unwrap_or(serde_json::Value::Null);
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_setting: {e}"))),
        }
    }

    async fn set_setting(
        &self,
        user_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let value_str = serde_json::to_string(value)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                "INSERT INTO settings (user_id, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id, key) DO UPDATE SET value = ?3, updated_at = ?4",
                params![user_id, key, value_str, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_setting: {e}")))?;

        Ok(())
    }

    async fn delete_setting(&self, user_id: &str, key: &str) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "DELETE FROM settings WHERE user_id = ?1 AND key = ?2",
                params![user_id, key],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_setting: {e}")))?;
        Ok(count > 0)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
