//! Reasoning response parsing
//!
//! The reasoning service answers in free text that should contain one JSON
//! object. Nothing about that text is trusted: the first balanced `{...}`
//! region is extracted and validated, and anything else is a [`ParseError`].

use sdk::ActionRequest;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors from interpreting a reasoning response
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("No JSON object found in response")]
    NoJsonObject,

    #[error("Invalid JSON in response: {0}")]
    InvalidJson(String),

    #[error("shouldAct is true but no suggestion was given")]
    MissingSuggestion,

    #[error("Suggestion has no actions")]
    EmptyActions,
}

/// Suggestion urgency
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        })
    }
}

/// Suggestion body as proposed by the reasoning service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedSuggestion {
    pub message: String,
    pub actions: Vec<ActionRequest>,
    #[serde(default)]
    pub priority: Priority,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDecision {
    #[serde(default)]
    should_act: bool,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    suggestion: Option<ProposedSuggestion>,
}

/// Validated reasoning decision
#[derive(Debug, Clone, PartialEq)]
pub enum ReasoningDecision {
    NoAction {
        reasoning: Option<String>,
    },
    Act {
        reasoning: Option<String>,
        suggestion: ProposedSuggestion,
    },
}

impl ReasoningDecision {
    pub fn should_act(&self) -> bool {
        matches!(self, ReasoningDecision::Act { .. })
    }

    pub fn reasoning(&self) -> Option<&str> {
        match self {
            ReasoningDecision::NoAction { reasoning } | ReasoningDecision::Act { reasoning, .. } => {
                reasoning.as_deref()
            }
        }
    }

    pub fn suggestion(&self) -> Option<&ProposedSuggestion> {
        match self {
            ReasoningDecision::NoAction { .. } => None,
            ReasoningDecision::Act { suggestion, .. } => Some(suggestion),
        }
    }
}

/// Parse a raw reasoning response
pub fn parse_response(raw: &str) -> Result<ReasoningDecision, ParseError> {
    let start = raw.find('{').ok_or(ParseError::NoJsonObject)?;
    let json = extract_balanced_json(&raw[start..]).ok_or(ParseError::NoJsonObject)?;

    let decision: RawDecision =
        serde_json::from_str(json).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    if !decision.should_act {
        return Ok(ReasoningDecision::NoAction {
            reasoning: decision.reasoning,
        });
    }

    let suggestion = decision.suggestion.ok_or(ParseError::MissingSuggestion)?;
    if suggestion.actions.is_empty() {
        return Err(ParseError::EmptyActions);
    }

    Ok(ReasoningDecision::Act {
        reasoning: decision.reasoning,
        suggestion,
    })
}

/// Extract a balanced JSON object from the start of a string
fn extract_balanced_json(s: &str) -> Option<&str> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
