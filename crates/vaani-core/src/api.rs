//! OpenAI-compatible chat completions client (Groq by default)

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::model::LanguageModel;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai";
pub const DEFAULT_MODEL: &str = "llama3-70b-8192";

/// Chat completions API client
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

/// Show only the first 3 and last 4 characters of a secret
pub fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &mask_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl ApiClient {
    /// Create a new API client
    pub fn new(api_key: String, model: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: 1000,
            temperature: 0.1,
        }
    }

    /// Set max tokens for responses
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set a custom base URL (any OpenAI-compatible endpoint)
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Make a single chat request and return the first choice's text
    pub async fn chat(&self, messages: &[ApiMessage]) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!(
            "Sending chat request with {} messages to {}",
            messages.len(),
            self.model
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send chat request")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat response")?;

        let text = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("Chat response had no content"))?;

        debug!("Received {} chars from {}", text.len(), self.model);
        Ok(text)
    }

    /// Get the model name
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for ApiClient {
    async fn complete(&self, system: &str, input: &str) -> Result<String> {
        let messages = [ApiMessage::system(system), ApiMessage::user(input)];
        self.chat(&messages).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Message in a chat request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMessage {
    pub role: String,
    pub content: String,
}

impl ApiMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_client_creation() {
        let client = ApiClient::new("test-key".to_string(), None);
        assert_eq!(client.model, DEFAULT_MODEL);
        assert_eq!(client.max_tokens, 1000);
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_api_client_debug_masks_key() {
        let client = ApiClient::new("gsk_1234567890abcdef".to_string(), None);
        let debug_output = format!("{:?}", client);

        assert!(debug_output.contains("gsk...cdef"));
        assert!(!debug_output.contains("gsk_1234567890abcdef"));
    }

    #[test]
    fn test_api_client_debug_masks_short_key() {
        let client = ApiClient::new("short".to_string(), None);
        let debug_output = format!("{:?}", client);

        assert!(debug_output.contains("***"));
        assert!(!debug_output.contains("short"));
    }

    #[test]
    fn test_api_client_debug_masks_non_ascii_key() {
        let client = ApiClient::new("ключ-секрет-значение".to_string(), None);
        let debug_output = format!("{:?}", client);

        assert!(debug_output.contains("клю...ение"));
        assert!(!debug_output.contains("секрет"));
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "(empty)");
        assert_eq!(mask_secret("short"), "***");
        assert_eq!(mask_secret("gsk_abcdefghijkl"), "gsk...ijkl");
        assert_eq!(mask_secret("ééééééééé"), "ééé...éééé");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new("k".to_string(), Some("m".to_string()))
            .with_base_url("http://localhost:8080/".to_string());
        assert_eq!(client.base_url, "http://localhost:8080");
        assert_eq!(client.model(), "m");
    }

    #[test]
    fn test_chat_request_serialization() {
        let messages = [ApiMessage::system("be brief"), ApiMessage::user("hi")];
        let body = ChatRequest {
            model: "m",
            messages: &messages,
            max_tokens: 10,
            temperature: 0.1,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
    }

    #[test]
    fn test_chat_response_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"composite"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("composite")
        );
    }

    #[tokio::test]
    async fn test_complete_unreachable_endpoint_errors() {
        let client = ApiClient::new("k".to_string(), None)
            .with_base_url("http://127.0.0.1:9".to_string());
        assert!(client.complete("sys", "hello").await.is_err());
    }
}
