//! Anthropic Messages API client.
//!
//! One `generate` call is one HTTP request. Whether a failure is worth
//! retrying is decided here, by status code and transport error kind; the
//! retry loop itself lives in `safety::failure_recovery`.

use crate::config::LlmSettings;
use crate::error::{PulseError, Result};
use crate::safety::NarrativeService;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// API key that switches the client to a canned local response.
pub const DUMMY_API_KEY: &str = "dummy-api-key";

#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
    settings: LlmSettings,
}

impl LlmClient {
    pub fn new(api_key: String, settings: LlmSettings) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(PulseError::Config(
                "ANTHROPIC_API_KEY is not set; pass --api-key or add it to .env".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PulseError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_key,
            settings,
        })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    pub fn is_offline(&self) -> bool {
        self.api_key == DUMMY_API_KEY
    }

    pub async fn call_llm(&self, prompt: &str) -> Result<String> {
        if self.is_offline() {
            info!("Dummy API key in use, returning canned narrative");
            return Ok(offline_response(prompt));
        }

        let body = serde_json::json!({
            "model": self.settings.model,
            "max_tokens": self.settings.max_tokens,
            "temperature": self.settings.temperature,
            "system": self.settings.system_prompt,
            "messages": [
                {"role": "user", "content": prompt}
            ],
        });

        let url = format!("{}/v1/messages", self.settings.base_url.trim_end_matches('/'));
        debug!("POST {} (model {})", url, self.settings.model);

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(status_error(status.as_u16(), &error_text));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PulseError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        if let Some(error) = response_json.get("error") {
            return Err(PulseError::Llm(format!("LLM API error: {}", error)));
        }

        Ok(extract_text(&response_json))
    }
}

#[async_trait]
impl NarrativeService for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.call_llm(prompt).await
    }
}

/// Rate limits, overload, server errors and request timeouts can clear up.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 409 | 425 | 429 | 529) || (500..600).contains(&status)
}

fn status_error(status: u16, body: &str) -> PulseError {
    let message = format!("LLM API error ({}): {}", status, body);
    if is_transient_status(status) {
        PulseError::LlmTransient(message)
    } else {
        PulseError::Llm(message)
    }
}

fn transport_error(err: reqwest::Error) -> PulseError {
    let message = format!("LLM API call failed: {}", err);
    if err.is_timeout() || err.is_connect() {
        PulseError::LlmTransient(message)
    } else {
        PulseError::Llm(message)
    }
}

/// First text block of a Messages API response, or "" when there is none.
pub fn extract_text(response: &serde_json::Value) -> String {
    response
        .get("content")
        .and_then(|c| c.as_array())
        .and_then(|blocks| {
            blocks
                .iter()
                .find(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
        })
        .and_then(|b| b.get("text"))
        .and_then(|t| t.as_str())
        .unwrap_or_default()
        .to_string()
}

fn offline_response(prompt: &str) -> String {
    let rows = prompt.lines().filter(|l| l.starts_with("| ") && !l.starts_with("| timeframe")).count();
    format!(
        "## Priority 1: Offline review\n\n\
         **What's happening:**\n{} anomaly rows were flagged; no model was called.\n\n\
         **Recommendation:**\nRe-run with a real API key for a prioritized narrative.",
        rows
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_statuses() {
        for status in [408, 409, 425, 429, 500, 502, 503, 529] {
            assert!(is_transient_status(status), "{}", status);
            assert!(status_error(status, "busy").is_transient());
        }
        for status in [400, 401, 403, 404, 413] {
            assert!(!is_transient_status(status), "{}", status);
            assert!(matches!(status_error(status, "nope"), PulseError::Llm(_)));
        }
    }

    #[test]
    fn extracts_first_text_block() {
        let response = serde_json::json!({
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "## Priority 1"},
                {"type": "text", "text": "ignored"}
            ]
        });
        assert_eq!(extract_text(&response), "## Priority 1");
        assert_eq!(extract_text(&serde_json::json!({"content": []})), "");
        assert_eq!(extract_text(&serde_json::json!({})), "");
    }

    #[test]
    fn empty_api_key_is_a_config_error() {
        let err = LlmClient::new("  ".to_string(), LlmSettings::default()).err().unwrap();
        assert!(matches!(err, PulseError::Config(_)));
    }

    #[tokio::test]
    async fn dummy_key_answers_offline() {
        let client = LlmClient::new(DUMMY_API_KEY.to_string(), LlmSettings::default()).unwrap();
        let prompt = "| timeframe | grouping |\n| WTD | Overall |\n| MTD | Country |";
        let text = client.generate(prompt).await.unwrap();
        assert!(text.contains("2 anomaly rows"));
    }
}
