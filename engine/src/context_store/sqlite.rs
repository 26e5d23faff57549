//! SQLite persistence for the context store
//!
//! Uses sqlx with WAL mode. All queries are parameterized; the only
//! interpolated identifiers are the fixed names from [`KeyedTable`].

use super::backend::{ContextBackend, KeyedTable};
use super::types::{KeyedEntry, LogEntry, LogKind, Pattern};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{ConnectOptions, Executor, Row};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// SQLite-backed [`ContextBackend`]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Open (or create) the database file at `db_path`
    ///
    /// Creates the parent directory if needed and enables WAL mode. The
    /// schema is created by `ensure_schema`, which `ContextStore::init` calls.
    pub async fn open(db_path: &Path) -> Result<Self> {
        info!("Opening context database at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }

        let connection_string = format!("sqlite:{}", db_path.display());
        let options = SqliteConnectOptions::from_str(&connection_string)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        debug!("Database connection established");
        Ok(Self { pool })
    }

    /// Private in-memory database, mostly for tests
    ///
    /// Limited to a single connection because every SQLite in-memory
    /// connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.disable_statement_logging();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;
        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Checkpoint the WAL and close all connections
    pub async fn close(self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .context("Failed to flush WAL")?;
        self.pool.close().await;
        info!("Database connection closed");
        Ok(())
    }
}

fn keyed_from_row(row: &SqliteRow) -> Result<KeyedEntry> {
    let raw: String = row.try_get("value")?;
    Ok(KeyedEntry {
        key: row.try_get("key")?,
        value: serde_json::from_str(&raw).context("Corrupt keyed value")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn log_from_row(row: &SqliteRow) -> Result<LogEntry> {
    let kind: String = row.try_get("kind")?;
    let payload: String = row.try_get("payload")?;
    Ok(LogEntry {
        id: row.try_get("id")?,
        timestamp: row.try_get("timestamp")?,
        kind: kind.parse::<LogKind>().map_err(|e| anyhow!(e))?,
        payload: serde_json::from_str(&payload).context("Corrupt log payload")?,
        rating: row.try_get("rating")?,
        feedback: row.try_get("feedback")?,
    })
}

#[async_trait]
impl ContextBackend for SqliteBackend {
    async fn ensure_schema(&self) -> Result<()> {
        self.pool
            .execute(include_str!("../../migrations/001_context.sql"))
            .await
            .context("Failed to execute migration 001_context.sql")?;
        debug!("Context schema ready");
        Ok(())
    }

    async fn load_keyed(&self, table: KeyedTable) -> Result<Vec<KeyedEntry>> {
        let sql = format!("SELECT key, value, updated_at FROM {}", table.as_str());
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to load {}", table.as_str()))?;

        rows.iter().map(keyed_from_row).collect()
    }

    async fn upsert_keyed(&self, table: KeyedTable, entry: &KeyedEntry) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            table.as_str()
        );
        sqlx::query(&sql)
            .bind(&entry.key)
            .bind(serde_json::to_string(&entry.value)?)
            .bind(entry.updated_at)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to write {} entry", table.as_str()))?;
        Ok(())
    }

    async fn delete_keyed(&self, table: KeyedTable, key: &str) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE key = ?", table.as_str());
        sqlx::query(&sql)
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete {} entry", table.as_str()))?;
        Ok(())
    }

    async fn load_patterns(&self) -> Result<Vec<Pattern>> {
        let rows = sqlx::query(
            "SELECT id, observation, confidence, created_at FROM patterns ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load patterns")?;

        rows.iter()
            .map(|row| {
                let observation: String = row.try_get("observation")?;
                Ok(Pattern {
                    id: row.try_get("id")?,
                    observation: serde_json::from_str(&observation)
                        .context("Corrupt pattern observation")?,
                    confidence: row.try_get("confidence")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn insert_pattern(
        &self,
        observation: &Map<String, Value>,
        confidence: f64,
        created_at: i64,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO patterns (observation, confidence, created_at) VALUES (?, ?, ?)",
        )
        .bind(serde_json::to_string(observation)?)
        .bind(confidence)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .context("Failed to add pattern")?;

        Ok(result.last_insert_rowid())
    }

    async fn insert_log(&self, kind: LogKind, payload: &Value, timestamp: i64) -> Result<i64> {
        let result = sqlx::query("INSERT INTO log (timestamp, kind, payload) VALUES (?, ?, ?)")
            .bind(timestamp)
            .bind(kind.as_str())
            .bind(serde_json::to_string(payload)?)
            .execute(&self.pool)
            .await
            .context("Failed to append log entry")?;

        Ok(result.last_insert_rowid())
    }

    async fn recent_log(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let rows = sqlx::query(
            "SELECT id, timestamp, kind, payload, rating, feedback FROM log \
             ORDER BY timestamp DESC, id DESC LIMIT ?",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch log")?;

        rows.iter().map(log_from_row).collect()
    }

    async fn all_log(&self) -> Result<Vec<LogEntry>> {
        let rows = sqlx::query(
            "SELECT id, timestamp, kind, payload, rating, feedback FROM log ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch log")?;

        rows.iter().map(log_from_row).collect()
    }

    async fn update_log_rating(&self, id: i64, rating: f64, feedback: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE log SET rating = ?, feedback = ? WHERE id = ?")
            .bind(rating)
            .bind(feedback)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to rate log entry")?;
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for table in ["profile", "patterns", "preferences", "log"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to clear {}", table))?;
        }
        tx.commit().await.context("Failed to commit clear")?;
        Ok(())
    }
}
