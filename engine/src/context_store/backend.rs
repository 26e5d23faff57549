//! Persistence backend contract for the context store

use super::types::{KeyedEntry, LogEntry, LogKind, Pattern};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// The two upsert-by-key tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyedTable {
    Profile,
    Preferences,
}

impl KeyedTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyedTable::Profile => "profile",
            KeyedTable::Preferences => "preferences",
        }
    }
}

/// Durable storage consumed by [`super::ContextStore`]
///
/// Implementations provide upsert/delete on the keyed tables, append with a
/// store-assigned id on `patterns` and `log`, and a newest-first scan of the
/// log.
#[async_trait]
pub trait ContextBackend: Send + Sync {
    /// Create the schema if it does not exist yet. Must be idempotent.
    async fn ensure_schema(&self) -> Result<()>;

    async fn load_keyed(&self, table: KeyedTable) -> Result<Vec<KeyedEntry>>;

    async fn upsert_keyed(&self, table: KeyedTable, entry: &KeyedEntry) -> Result<()>;

    async fn delete_keyed(&self, table: KeyedTable, key: &str) -> Result<()>;

    /// All patterns in insertion order
    async fn load_patterns(&self) -> Result<Vec<Pattern>>;

    /// Append a pattern and return its assigned id
    async fn insert_pattern(
        &self,
        observation: &Map<String, Value>,
        confidence: f64,
        created_at: i64,
    ) -> Result<i64>;

    /// Append a log entry and return its assigned id
    async fn insert_log(&self, kind: LogKind, payload: &Value, timestamp: i64) -> Result<i64>;

    /// Up to `limit` log entries, newest first by timestamp
    async fn recent_log(&self, limit: usize) -> Result<Vec<LogEntry>>;

    /// Every log entry, oldest first
    async fn all_log(&self) -> Result<Vec<LogEntry>>;

    async fn update_log_rating(&self, id: i64, rating: f64, feedback: Option<&str>) -> Result<()>;

    /// Wipe all four tables
    async fn clear_all(&self) -> Result<()>;
}
