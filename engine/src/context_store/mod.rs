//! Context Store
//!
//! Local memory for the orchestrator: user profile, learned patterns,
//! feedback-derived preferences and the audit log. Everything is persisted
//! through a [`ContextBackend`] and never leaves the device.
//!
//! Profile, patterns and preferences are fully cached in memory after
//! `init()`; reads are served from the cache and writes go to the backend
//! and the cache together. The log is unbounded, so it is never cached and
//! every log read goes to the backend.

pub mod backend;
pub mod sqlite;
pub mod types;

pub use backend::{ContextBackend, KeyedTable};
pub use sqlite::SqliteBackend;
pub use types::{
    ContextExport, KeyedEntry, LogEntry, LogKind, NewPattern, Pattern, UserContext,
    DEFAULT_PATTERN_CONFIDENCE, RESERVED_PATTERN_KEYS,
};

use anyhow::Result;
use sdk::EngineError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Number of most recent log entries searched by `rate_action`
pub const DEFAULT_RATING_LOOKBACK: usize = 100;

#[derive(Default)]
struct Cache {
    initialized: bool,
    profile: BTreeMap<String, KeyedEntry>,
    patterns: Vec<Pattern>,
    preferences: BTreeMap<String, KeyedEntry>,
}

impl Cache {
    fn keyed_mut(&mut self, table: KeyedTable) -> &mut BTreeMap<String, KeyedEntry> {
        match table {
            KeyedTable::Profile => &mut self.profile,
            KeyedTable::Preferences => &mut self.preferences,
        }
    }

    fn keyed(&self, table: KeyedTable) -> &BTreeMap<String, KeyedEntry> {
        match table {
            KeyedTable::Profile => &self.profile,
            KeyedTable::Preferences => &self.preferences,
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Durable profile/pattern/preference/log store with a read cache
pub struct ContextStore {
    backend: Arc<dyn ContextBackend>,
    cache: RwLock<Cache>,
    rating_lookback: usize,
}

impl ContextStore {
    pub fn new(backend: Arc<dyn ContextBackend>) -> Self {
        Self {
            backend,
            cache: RwLock::new(Cache::default()),
            rating_lookback: DEFAULT_RATING_LOOKBACK,
        }
    }

    /// Override how many recent log entries `rate_action` searches
    pub fn with_rating_lookback(mut self, lookback: usize) -> Self {
        self.rating_lookback = lookback;
        self
    }

    /// Create the schema and load profile, patterns and preferences
    ///
    /// Idempotent. Storage failures are logged and leave the cache empty;
    /// they never abort startup.
    pub async fn init(&self) {
        let mut cache = self.cache.write().await;
        if cache.initialized {
            return;
        }

        if let Err(e) = self.backend.ensure_schema().await {
            warn!(error = %e, "Failed to prepare context schema");
        }

        match self.load_all().await {
            Ok(loaded) => {
                *cache = loaded;
                info!(
                    profile = cache.profile.len(),
                    patterns = cache.patterns.len(),
                    preferences = cache.preferences.len(),
                    "Loaded context from disk"
                );
            }
            Err(e) => {
                warn!(error = %e, "Failed to load context; starting with an empty cache");
                *cache = Cache::default();
            }
        }
        cache.initialized = true;
    }

    async fn load_all(&self) -> Result<Cache> {
        let by_key = |entries: Vec<KeyedEntry>| {
            entries
                .into_iter()
                .map(|e| (e.key.clone(), e))
                .collect::<BTreeMap<_, _>>()
        };

        Ok(Cache {
            initialized: false,
            profile: by_key(self.backend.load_keyed(KeyedTable::Profile).await?),
            patterns: self.backend.load_patterns().await?,
            preferences: by_key(self.backend.load_keyed(KeyedTable::Preferences).await?),
        })
    }

    // === PROFILE ===

    pub async fn set_profile(&self, key: &str, value: Value) -> Result<()> {
        self.set_keyed(KeyedTable::Profile, key, value).await
    }

    pub async fn get_profile(&self, key: &str) -> Option<Value> {
        self.get_keyed(KeyedTable::Profile, key).await
    }

    pub async fn get_all_profile(&self) -> BTreeMap<String, KeyedEntry> {
        self.cache.read().await.profile.clone()
    }

    pub async fn delete_profile(&self, key: &str) -> Result<()> {
        let mut cache = self.cache.write().await;
        self.backend.delete_keyed(KeyedTable::Profile, key).await?;
        cache.profile.remove(key);
        Ok(())
    }

    // === PATTERNS ===

    /// Append a pattern, defaulting confidence to 0.5
    ///
    /// Confidence outside `[0, 1]` and observation keys that collide with the
    /// record's own fields are rejected with `EngineError::Validation`.
    pub async fn add_pattern(&self, pattern: NewPattern) -> Result<Pattern> {
        if let Some(key) = RESERVED_PATTERN_KEYS
            .iter()
            .find(|key| pattern.observation.contains_key(**key))
        {
            return Err(EngineError::Validation(format!(
                "pattern observation may not use reserved key '{}'",
                key
            ))
            .into());
        }

        let confidence = pattern.confidence.unwrap_or(DEFAULT_PATTERN_CONFIDENCE);
        if !(0.0..=1.0).contains(&confidence) {
            return Err(EngineError::Validation(format!(
                "pattern confidence {} is outside [0, 1]",
                confidence
            ))
            .into());
        }

        let mut cache = self.cache.write().await;
        let created_at = now_millis();
        let id = self
            .backend
            .insert_pattern(&pattern.observation, confidence, created_at)
            .await?;

        let stored = Pattern {
            id,
            observation: pattern.observation,
            confidence,
            created_at,
        };
        cache.patterns.push(stored.clone());
        Ok(stored)
    }

    pub async fn get_patterns(&self) -> Vec<Pattern> {
        self.cache.read().await.patterns.clone()
    }

    // === PREFERENCES ===

    pub async fn set_preference(&self, key: &str, value: Value) -> Result<()> {
        self.set_keyed(KeyedTable::Preferences, key, value).await
    }

    pub async fn get_preference(&self, key: &str) -> Option<Value> {
        self.get_keyed(KeyedTable::Preferences, key).await
    }

    async fn set_keyed(&self, table: KeyedTable, key: &str, value: Value) -> Result<()> {
        if key.is_empty() {
            return Err(EngineError::Validation(format!("{} key is empty", table.as_str())).into());
        }

        let entry = KeyedEntry {
            key: key.to_string(),
            value,
            updated_at: now_millis(),
        };

        // Cache and storage must apply writes in the same order.
        let mut cache = self.cache.write().await;
        self.backend.upsert_keyed(table, &entry).await?;
        cache.keyed_mut(table).insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn get_keyed(&self, table: KeyedTable, key: &str) -> Option<Value> {
        self.cache
            .read()
            .await
            .keyed(table)
            .get(key)
            .map(|e| e.value.clone())
    }

    // === LOG ===

    /// Append an audit entry with a store-assigned id and timestamp
    pub async fn log_action(&self, kind: LogKind, payload: Value) -> Result<LogEntry> {
        let timestamp = now_millis();
        let id = self.backend.insert_log(kind, &payload, timestamp).await?;
        debug!(id, kind = %kind, "Logged action");

        Ok(LogEntry {
            id,
            timestamp,
            kind,
            payload,
            rating: None,
            feedback: None,
        })
    }

    /// Most recent log entries, newest first, read from storage
    pub async fn get_log(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.backend.recent_log(limit).await
    }

    /// Rate a log entry
    ///
    /// Only the most recent entries (100 by default) are searched. Returns
    /// `false`, without error, when `id` is not in that window.
    pub async fn rate_action(&self, id: i64, rating: f64, feedback: Option<&str>) -> Result<bool> {
        let recent = self.backend.recent_log(self.rating_lookback).await?;
        if !recent.iter().any(|e| e.id == id) {
            debug!(id, "Log entry outside rating window; ignoring");
            return Ok(false);
        }

        self.backend.update_log_rating(id, rating, feedback).await?;
        Ok(true)
    }

    // === FULL CONTEXT (for orchestrator) ===

    pub async fn get_full_context(&self) -> UserContext {
        let cache = self.cache.read().await;
        UserContext {
            profile: cache.profile.clone(),
            patterns: cache.patterns.clone(),
            preferences: cache.preferences.clone(),
        }
    }

    // === EXPORT / CLEAR (user data ownership) ===

    /// Snapshot of all four tables
    pub async fn export_all(&self) -> Result<ContextExport> {
        let log = self.backend.all_log().await?;
        let cache = self.cache.read().await;
        Ok(ContextExport {
            profile: cache.profile.clone(),
            patterns: cache.patterns.clone(),
            preferences: cache.preferences.clone(),
            log,
            exported_at: now_millis(),
        })
    }

    /// Snapshot rendered as pretty-printed JSON
    pub async fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export_all().await?)?)
    }

    /// Wipe all four tables and the cache
    pub async fn clear_all(&self) -> Result<()> {
        let mut cache = self.cache.write().await;
        self.backend.clear_all().await?;
        cache.profile.clear();
        cache.patterns.clear();
        cache.preferences.clear();
        info!("All context data cleared");
        Ok(())
    }
}
