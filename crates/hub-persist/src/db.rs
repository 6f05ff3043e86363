//! Connection pool setup. Keeps the teacher's `SqliteConfig` pragma-setting
//! shape (`vex-persist/src/sqlite.rs`) but drops the SQLCipher/KV-store
//! concerns that don't apply here: the hub owns one `events` + one
//! `declarations` table, not an opaque key-value store.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database connection failed: {0}")]
    Connection(String),
    #[error("migration failed: {0}")]
    Migration(String),
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout_secs: u32,
}

impl DbConfig {
    pub fn file(db_name: &str) -> Self {
        Self {
            url: format!("sqlite:{db_name}?mode=rwc"),
            max_connections: 5,
            busy_timeout_secs: 30,
        }
    }

    pub fn memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            busy_timeout_secs: 5,
        }
    }
}

/// Open the pool, set the pragmas the sequencer's single-writer protocol
/// depends on (spec §4.D: WAL journal mode, `synchronous=FULL`, a busy
/// timeout so lock contention blocks instead of failing immediately), and
/// run pending migrations.
pub async fn connect(config: &DbConfig) -> Result<SqlitePool, DbError> {
    let options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|e| DbError::Connection(e.to_string()))?
        .pragma("busy_timeout", config.busy_timeout_secs.to_string())
        .pragma("journal_mode", "WAL")
        .pragma("synchronous", "FULL")
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .map_err(|e| DbError::Connection(e.to_string()))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| DbError::Migration(e.to_string()))?;

    Ok(pool)
}
