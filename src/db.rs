//! SQLite pool setup and the embedded schema migration.

use anyhow::Result;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::path::Path;

const INIT_MIGRATION: &str = include_str!("../migrations/0001_init.sql");

/// Open the pool, creating the database file and its parent directory on first use.
pub async fn connect(db_url: &str) -> Result<SqlitePool> {
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    if !db_path.starts_with(":memory:") {
        let db_path_obj = Path::new(db_path);
        if let Some(parent) = db_path_obj.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
                tracing::info!("Created missing directory {:?}", parent);
            }
        }
        if !db_path_obj.exists() {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(db_path_obj)?;
            tracing::info!("Created database file {}", db_path);
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;
    Ok(pool)
}

/// Run the schema migration statement by statement.
pub async fn run_migrations(db: &SqlitePool) -> Result<()> {
    let statements = INIT_MIGRATION
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(())
}

/// Single-connection in-memory database with the schema applied.
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

/// Insert a user and return its id.
#[cfg(test)]
pub(crate) async fn insert_test_user(db: &SqlitePool, name: &str) -> uuid::Uuid {
    let id = uuid::Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, name, email, created_at) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(name)
        .bind(format!("{}@example.com", name))
        .bind(chrono::Utc::now())
        .execute(db)
        .await
        .unwrap();
    id
}

/// Insert a session for `user_id` expiring `ttl` from now (negative for expired).
#[cfg(test)]
pub(crate) async fn insert_test_session(
    db: &SqlitePool,
    user_id: uuid::Uuid,
    token: &str,
    ttl: chrono::Duration,
) {
    sqlx::query("INSERT INTO sessions (id, token, user_id, expires_at) VALUES (?, ?, ?, ?)")
        .bind(uuid::Uuid::new_v4())
        .bind(token)
        .bind(user_id)
        .bind(chrono::Utc::now() + ttl)
        .execute(db)
        .await
        .unwrap();
}
