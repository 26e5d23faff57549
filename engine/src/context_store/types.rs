//! Context store record types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Confidence given to a pattern recorded without one
pub const DEFAULT_PATTERN_CONFIDENCE: f64 = 0.5;

/// Fields of a serialized [`Pattern`]; observations may not use them as keys
pub const RESERVED_PATTERN_KEYS: [&str; 3] = ["id", "confidence", "createdAt"];

/// Profile or preference entry (upsert by key, last write wins)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyedEntry {
    pub key: String,
    pub value: Value,
    /// Epoch milliseconds
    pub updated_at: i64,
}

/// Pattern as supplied by the caller
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPattern {
    pub observation: Map<String, Value>,
    pub confidence: Option<f64>,
}

impl NewPattern {
    pub fn new(observation: Map<String, Value>) -> Self {
        Self {
            observation,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Learned behavioral pattern (append-only)
///
/// The observation is flattened next to the record fields, so its keys never
/// overlap [`RESERVED_PATTERN_KEYS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    pub id: i64,
    #[serde(flatten)]
    pub observation: Map<String, Value>,
    pub confidence: f64,
    pub created_at: i64,
}

/// Kind of audit log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    EventReceived,
    ReasoningComplete,
    ReasoningError,
    ActionExecuted,
    ActionFailed,
    SuggestionDismissed,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::EventReceived => "event_received",
            LogKind::ReasoningComplete => "reasoning_complete",
            LogKind::ReasoningError => "reasoning_error",
            LogKind::ActionExecuted => "action_executed",
            LogKind::ActionFailed => "action_failed",
            LogKind::SuggestionDismissed => "suggestion_dismissed",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "event_received" => Ok(LogKind::EventReceived),
            "reasoning_complete" => Ok(LogKind::ReasoningComplete),
            "reasoning_error" => Ok(LogKind::ReasoningError),
            "action_executed" => Ok(LogKind::ActionExecuted),
            "action_failed" => Ok(LogKind::ActionFailed),
            "suggestion_dismissed" => Ok(LogKind::SuggestionDismissed),
            other => Err(format!("unknown log kind: {}", other)),
        }
    }
}

/// Audit log record
///
/// Append-only; only `rating` and `feedback` are ever mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    /// Epoch milliseconds, assigned by the store
    pub timestamp: i64,
    pub kind: LogKind,
    pub payload: Value,
    pub rating: Option<f64>,
    pub feedback: Option<String>,
}

/// User context handed to the reasoning prompt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub profile: BTreeMap<String, KeyedEntry>,
    pub patterns: Vec<Pattern>,
    pub preferences: BTreeMap<String, KeyedEntry>,
}

/// Full snapshot of all four tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextExport {
    pub profile: BTreeMap<String, KeyedEntry>,
    pub patterns: Vec<Pattern>,
    pub preferences: BTreeMap<String, KeyedEntry>,
    /// Oldest first
    pub log: Vec<LogEntry>,
    pub exported_at: i64,
}

impl ContextExport {
    pub fn is_empty(&self) -> bool {
        self.profile.is_empty()
            && self.patterns.is_empty()
            && self.preferences.is_empty()
            && self.log.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_log_kind_round_trips_through_str() {
        for kind in [
            LogKind::EventReceived,
            LogKind::ReasoningComplete,
            LogKind::ReasoningError,
            LogKind::ActionExecuted,
            LogKind::ActionFailed,
            LogKind::SuggestionDismissed,
        ] {
            assert_eq!(kind.as_str().parse::<LogKind>().unwrap(), kind);
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                json!(kind.as_str())
            );
        }
        assert!("rated".parse::<LogKind>().is_err());
    }

    #[test]
    fn test_pattern_flattens_observation() {
        let mut observation = Map::new();
        observation.insert("habit".into(), json!("gym on mondays"));
        let pattern = Pattern {
            id: 7,
            observation,
            confidence: 0.8,
            created_at: 1,
        };

        let value = serde_json::to_value(&pattern).unwrap();
        assert_eq!(value["habit"], json!("gym on mondays"));
        assert_eq!(value["createdAt"], json!(1));
    }
}
