//! Reasoning context and prompt rendering
//!
//! Gathers everything the reasoning service sees for one trigger and renders
//! it into a single natural-language instruction.

use crate::context_store::UserContext;
use chrono::{DateTime, Local, Timelike};
use sdk::AppManifest;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The (topic, payload) pair that started a cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub topic: String,
    pub payload: Value,
    /// RFC 3339
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInfo {
    pub now: String,
    pub day_of_week: String,
    pub time_of_day: String,
}

impl TimeInfo {
    pub fn at(now: DateTime<Local>) -> Self {
        Self {
            now: now.to_rfc3339(),
            day_of_week: now.format("%A").to_string(),
            time_of_day: time_of_day(now.hour()).to_string(),
        }
    }
}

/// Everything one reasoning call is given
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningContext {
    pub trigger: Trigger,
    pub app_state: Map<String, Value>,
    pub capabilities: Vec<AppManifest>,
    pub user_context: UserContext,
    pub time: TimeInfo,
}

/// Bucket an hour of the day (0-23)
pub fn time_of_day(hour: u32) -> &'static str {
    match hour {
        0..=5 => "night",
        6..=11 => "morning",
        12..=16 => "afternoon",
        17..=20 => "evening",
        _ => "night",
    }
}

fn pretty(value: &impl Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

const INSTRUCTIONS: &str = r#"## Instructions
1. Analyze the trigger event in context of the user's state, patterns, and preferences
2. Decide if any action should be suggested to the user
3. Be helpful but not annoying - only suggest things that matter
4. Respect user preferences about what NOT to be notified about
5. Consider time of day and context

## Response Format
Respond with JSON only:
{
  "shouldAct": true/false,
  "reasoning": "Brief explanation of your thinking",
  "suggestion": {
    "message": "What to say to the user (conversational, not robotic)",
    "actions": [
      {
        "app": "appName",
        "action": "actionName",
        "params": {}
      }
    ],
    "priority": "low/medium/high"
  }
}

If shouldAct is false, only include reasoning."#;

impl ReasoningContext {
    /// Render the prompt sent to the reasoning service
    pub fn render_prompt(&self) -> String {
        let mut prompt = String::with_capacity(4096);

        prompt.push_str(
            "You are the orchestration layer for Aware, a personal operating system. \
             Your job is to reason about events and decide if any action should be taken.\n\n",
        );
        prompt.push_str("## Your Capabilities\n");
        prompt.push_str(
            "You can see the state of all apps and dispatch actions to them. \
             You understand the user's patterns and preferences.\n\n",
        );

        prompt.push_str("## Current Trigger\n");
        prompt.push_str(&format!("Event: {}\n", self.trigger.topic));
        prompt.push_str(&format!("Data: {}\n\n", pretty(&self.trigger.payload)));

        prompt.push_str("## App States\n");
        prompt.push_str(&pretty(&self.app_state));
        prompt.push_str("\n\n## Available Apps and Their Capabilities\n");
        prompt.push_str(&pretty(&self.capabilities));
        prompt.push_str("\n\n## User Context\n");
        prompt.push_str(&pretty(&self.user_context));

        prompt.push_str("\n\n## Current Time\n");
        prompt.push_str(&format!(
            "{}, {}\n{}\n\n",
            self.time.day_of_week, self.time.time_of_day, self.time.now
        ));

        prompt.push_str(INSTRUCTIONS);
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_time_of_day_buckets() {
        let expected = [
            (0, "night"),
            (5, "night"),
            (6, "morning"),
            (11, "morning"),
            (12, "afternoon"),
            (16, "afternoon"),
            (17, "evening"),
            (20, "evening"),
            (21, "night"),
            (23, "night"),
        ];
        for (hour, bucket) in expected {
            assert_eq!(time_of_day(hour), bucket, "hour {}", hour);
        }
    }

    #[test]
    fn test_time_info_uses_weekday_name() {
        // 2024-01-01 was a Monday
        let now = Local.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap();
        let info = TimeInfo::at(now);
        assert_eq!(info.day_of_week, "Monday");
        assert_eq!(info.time_of_day, "morning");
    }

    #[test]
    fn test_prompt_embeds_every_section() {
        let mut app_state = Map::new();
        app_state.insert("calendar".into(), json!({"events": 3}));

        let context = ReasoningContext {
            trigger: Trigger {
                topic: "calendar_conflict_detected".into(),
                payload: json!({"source": "calendar"}),
                timestamp: "2024-01-01T09:30:00+00:00".into(),
            },
            app_state,
            capabilities: vec![AppManifest::new("calendar", "time")],
            user_context: UserContext::default(),
            time: TimeInfo {
                now: "2024-01-01T09:30:00+00:00".into(),
                day_of_week: "Monday".into(),
                time_of_day: "morning".into(),
            },
        };

        let prompt = context.render_prompt();
        assert!(prompt.contains("Event: calendar_conflict_detected"));
        assert!(prompt.contains("\"events\": 3"));
        assert!(prompt.contains("\"name\": \"calendar\""));
        assert!(prompt.contains("Monday, morning"));
        assert!(prompt.ends_with("If shouldAct is false, only include reasoning."));
    }

    #[test]
    fn test_context_serializes_camel_case() {
        let info = TimeInfo {
            now: "n".into(),
            day_of_week: "Friday".into(),
            time_of_day: "evening".into(),
        };
        let value = serde_json::to_value(info).unwrap();
        assert_eq!(value["dayOfWeek"], json!("Friday"));
        assert_eq!(value["timeOfDay"], json!("evening"));
    }
}
