use super::{ReasoningError, ReasoningService};
use crate::config::ReasoningConfig;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// Anthropic Messages API client
pub struct AnthropicReasoner {
    config: ReasoningConfig,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicReasoner {
    pub fn new(config: ReasoningConfig, api_key: impl Into<String>) -> super::Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ReasoningError::MissingCredential);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReasoningError::Network(e.to_string()))?;

        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    /// Build a reasoner from config, reading the key from the environment
    ///
    /// Returns `None` when no key is set.
    pub fn from_env(config: &ReasoningConfig) -> super::Result<Option<Self>> {
        match config.api_key() {
            Some(key) => Self::new(config.clone(), key).map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ReasoningService for AnthropicReasoner {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, prompt: &str) -> super::Result<String> {
        let url = format!("{}/messages", self.config.base_url);

        let payload = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ReasoningError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                401 | 403 => ReasoningError::Authentication(text),
                429 => ReasoningError::RateLimited,
                code => ReasoningError::InvalidRequest(format!("{}: {}", code, text)),
            });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ReasoningError::MalformedResponse(e.to_string()))?;

        let content_arr = data
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| {
                ReasoningError::MalformedResponse("No content array in response".to_string())
            })?;

        let mut full_content = String::new();
        for item in content_arr {
            if let Some(text) = item.get("text").and_then(|t| t.as_str()) {
                full_content.push_str(text);
            }
        }

        if full_content.is_empty() {
            return Err(ReasoningError::MalformedResponse(
                "Response contained no text".to_string(),
            ));
        }

        Ok(full_content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_key_rejected() {
        let err = AnthropicReasoner::new(ReasoningConfig::default(), "   ")
            .err()
            .unwrap();
        assert!(matches!(err, ReasoningError::MissingCredential));
    }

    #[test]
    fn test_from_env_without_key_is_none() {
        let config = ReasoningConfig {
            api_key_env: "AWARE_TEST_UNSET_KEY".to_string(),
            ..Default::default()
        };
        assert!(AnthropicReasoner::from_env(&config).unwrap().is_none());
    }
}
