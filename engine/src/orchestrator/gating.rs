//! Gating policy
//!
//! Cheap local filter that decides whether a trigger is worth a reasoning
//! call.

use serde_json::Value;

/// Topics that always warrant reasoning
pub const IMPORTANT_TOPICS: &[&str] = &[
    "weather_precipitation_expected",
    "calendar_event_created",
    "calendar_event_moved",
    "calendar_conflict_detected",
    "todo_task_overdue",
    "message_received",
    "email_high_priority",
];

/// Returns true if `topic` is allow-listed, or the payload asks for attention
/// via `priority == "high"` or a truthy `needsAttention`.
pub fn evaluate_event(topic: &str, payload: &Value) -> bool {
    if IMPORTANT_TOPICS.contains(&topic) {
        return true;
    }

    if payload.get("priority").and_then(Value::as_str) == Some("high") {
        return true;
    }

    payload.get("needsAttention").is_some_and(is_truthy)
}

/// JSON truthiness: everything except null, false, 0 and "" counts
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listed_topics_pass_regardless_of_payload() {
        for topic in IMPORTANT_TOPICS {
            assert!(evaluate_event(topic, &Value::Null));
            assert!(evaluate_event(topic, &json!({"priority": "low"})));
        }
    }

    #[test]
    fn test_payload_flags() {
        assert!(evaluate_event("app_tick", &json!({"priority": "high"})));
        assert!(evaluate_event("app_tick", &json!({"needsAttention": true})));
        assert!(evaluate_event("app_tick", &json!({"needsAttention": "yes"})));
        assert!(evaluate_event("app_tick", &json!({"needsAttention": 1})));
    }

    #[test]
    fn test_unremarkable_events_are_filtered() {
        assert!(!evaluate_event("app_tick", &json!({})));
        assert!(!evaluate_event("app_tick", &Value::Null));
        assert!(!evaluate_event("app_tick", &json!({"priority": "HIGH"})));
        assert!(!evaluate_event("app_tick", &json!({"needsAttention": false})));
        assert!(!evaluate_event("app_tick", &json!({"needsAttention": 0})));
        assert!(!evaluate_event("app_tick", &json!({"needsAttention": ""})));
        assert!(!evaluate_event("app_tick", &json!({"needsAttention": null})));
    }
}
