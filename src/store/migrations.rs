//! Version-tracked schema for the libSQL backend. Versions above the
//! highest recorded in `_migrations` are applied in order.

use libsql::Connection;
use tracing::info;

use crate::error::DatabaseError;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Append only.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "profiles",
        sql: r#"
            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                email TEXT NOT NULL DEFAULT '',
                name TEXT NOT NULL,
                phone TEXT,
                location TEXT,
                bio TEXT,
                role TEXT NOT NULL,
                onboarding_completed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_profiles_role ON profiles(role);
        "#,
    },
    Migration {
        version: 2,
        name: "settings",
        sql: r#"
            CREATE TABLE IF NOT EXISTS settings (
                user_id TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (user_id, key)
            );
        "#,
    },
    Migration {
        version: 3,
        name: "employer_profile_fields",
        sql: r#"
            ALTER TABLE profiles ADD COLUMN company TEXT;
            ALTER TABLE profiles ADD COLUMN industry TEXT;
        "#,
    },
];

pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("_migrations table: {e}")))?;

    let applied = current_version(conn).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > applied).collect();
    if pending.is_empty() {
        return Ok(());
    }

    for m in &pending {
        info!(version = m.version, name = m.name, "Applying migration");
        conn.execute_batch(m.sql)
            .await
            .map_err(|e| DatabaseError::Migration(format!("V{} {}: {e}", m.version, m.name)))?;
        conn.execute(
            "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
            libsql::params![m.version, m.name],
        )
        .await
        .map_err(|e| DatabaseError::Migration(format!("record V{}: {e}", m.version)))?;
    }

    info!(applied = pending.len(), from = applied, "Schema up to date");
    Ok(())
}

async fn current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let err = |e: libsql::Error| DatabaseError::Migration(format!("schema version: {e}"));
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(err)?;
    match rows.next().await.map_err(err)? {
        Some(row) => row.get::<i64>(0).map_err(err),
        None => Ok(0),
    }
}
