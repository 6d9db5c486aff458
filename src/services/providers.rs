// AI Provider Service
// OpenAI-compatible chat completions and the model seam the pipeline drives

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use super::config_store::AppConfig;

pub const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const OPENAI_PROVIDER: &str = "openai";

const HTTP_TIMEOUT_SECS: u64 = 80;

pub const ANALYSIS_SYSTEM_PROMPT: &str =
    "You are a legal contract risk analyzer. Always return valid JSON matching the specified format.";

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Missing content in response")]
    MissingContent,
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("API key not configured")]
    MissingApiKey,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageResponse>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    pub content: String,
    pub latency_ms: i64,
}

/// A text-completion backend the analysis pipeline can drive.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Whether a credential is available. Checked before any call is made.
    fn is_configured(&self) -> bool;

    /// Send one prompt and return the raw (expected JSON) reply text.
    async fn complete(&self, prompt: &str) -> Result<ChatResult, ProviderError>;
}

pub struct ProviderClient {
    client: Client,
    openai_url: String,
}

impl Default for ProviderClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            client,
            openai_url: default_openai_url(),
        }
    }

    pub fn with_proxy(proxy_url: &str) -> Result<Self, ProviderError> {
        let proxy = reqwest::Proxy::all(proxy_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .proxy(proxy)
            .build()?;

        Ok(Self {
            client,
            openai_url: default_openai_url(),
        })
    }

    /// Point the client at another OpenAI-compatible server. Accepts a bare
    /// host, a `/v1` base or a full chat-completions endpoint.
    pub fn with_base_url(mut self, url: impl AsRef<str>) -> Self {
        self.openai_url = chat_completions_url(url.as_ref());
        self
    }

    pub fn openai_url(&self) -> &str {
        &self.openai_url
    }

    pub async fn call_openai_json(
        &self,
        model: &str,
        api_key: &str,
        system: &str,
        user: &str,
        temperature: f64,
    ) -> Result<ChatResult, ProviderError> {
        self.call_chat_api(&self.openai_url, model, api_key, system, user, temperature, true)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn call_chat_api(
        &self,
        url: &str,
        model: &str,
        api_key: &str,
        system: &str,
        user: &str,
        temperature: f64,
        use_json_format: bool,
    ) -> Result<ChatResult, ProviderError> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature,
            response_format: use_json_format.then(|| ResponseFormat {
                r#type: "json_object".to_string(),
            }),
        };

        let start = Instant::now();

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let content = data
            .choices
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or(ProviderError::MissingContent)?;

        debug!(
            "[PROVIDER] chat ok model={} latency_ms={} chars={}",
            model,
            latency_ms,
            content.len()
        );

        Ok(ChatResult { content, latency_ms })
    }
}

fn default_openai_url() -> String {
    env::var("OPENAI_API_URL")
        .ok()
        .filter(|u| !u.trim().is_empty())
        .map(|u| chat_completions_url(&u))
        .unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string())
}

fn chat_completions_url(base: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else if base.ends_with("/v1") {
        format!("{}/chat/completions", base)
    } else {
        format!("{}/v1/chat/completions", base)
    }
}

/// OpenAI chat model bound to a credential and sampling settings.
pub struct OpenAiModel {
    client: ProviderClient,
    api_key: Option<String>,
    model: String,
    temperature: f64,
}

impl OpenAiModel {
    pub fn new(client: ProviderClient, api_key: Option<String>, model: impl Into<String>, temperature: f64) -> Self {
        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            temperature,
        }
    }

    /// Build from application config: proxy, stored endpoint override and
    /// API key (environment first, then the config file).
    pub fn from_config(config: &AppConfig) -> Self {
        let proxy_url = config.proxy.as_ref().and_then(|p| p.active_url());
        let mut client = match proxy_url {
            Some(url) => ProviderClient::with_proxy(url).unwrap_or_else(|e| {
                warn!("[PROVIDER] invalid proxy {}: {}; connecting directly", url, e);
                ProviderClient::new()
            }),
            None => ProviderClient::new(),
        };

        let stored_url = config
            .providers
            .get(OPENAI_PROVIDER)
            .and_then(|p| p.base_url.clone())
            .filter(|u| !u.trim().is_empty());
        if env::var("OPENAI_API_URL").is_err() {
            if let Some(url) = stored_url {
                client = client.with_base_url(url);
            }
        }

        let api_key = api_key_from_env(OPENAI_PROVIDER)
            .or_else(|| config.api_keys.get(OPENAI_PROVIDER).cloned());

        let model = config
            .providers
            .get(OPENAI_PROVIDER)
            .and_then(|p| p.model.clone())
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| config.pipeline.model.clone());

        Self::new(client, api_key, model, config.pipeline.temperature)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, prompt: &str) -> Result<ChatResult, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or(ProviderError::MissingApiKey)?;
        self.client
            .call_openai_json(&self.model, api_key, ANALYSIS_SYSTEM_PROMPT, prompt, self.temperature)
            .await
    }
}

fn api_key_from_env(provider: &str) -> Option<String> {
    let env_keys: &[&str] = match provider {
        "openai" => &["OPENAI_API_KEY", "REDLINE_OPENAI_API_KEY"],
        _ => &[],
    };

    env_keys.iter().find_map(|key| {
        env::var(key)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_client_creation() {
        let client = ProviderClient::new().with_base_url("http://127.0.0.1:1/v1/chat/completions");
        assert_eq!(client.openai_url(), "http://127.0.0.1:1/v1/chat/completions");
    }

    #[test]
    fn test_base_url_gets_chat_completions_path() {
        assert_eq!(
            chat_completions_url("http://localhost:9999"),
            "http://localhost:9999/v1/chat/completions"
        );
        assert_eq!(
            chat_completions_url("https://proxy.example.com/v1/"),
            "https://proxy.example.com/v1/chat/completions"
        );
        assert_eq!(chat_completions_url(OPENAI_DEFAULT_URL), OPENAI_DEFAULT_URL);

        let client = ProviderClient::new().with_base_url("http://localhost:9999");
        assert_eq!(client.openai_url(), "http://localhost:9999/v1/chat/completions");
    }

    #[test]
    fn test_blank_key_is_not_configured() {
        let model = OpenAiModel::new(ProviderClient::new(), Some("  ".to_string()), "gpt-3.5-turbo", 0.3);
        assert!(!model.is_configured());

        let model = OpenAiModel::new(ProviderClient::new(), Some("sk-test".to_string()), "gpt-3.5-turbo", 0.3);
        assert!(model.is_configured());
        assert_eq!(model.model(), "gpt-3.5-turbo");
    }

    #[tokio::test]
    async fn test_complete_without_key_fails_before_network() {
        let client = ProviderClient::new().with_base_url("http://127.0.0.1:1/unreachable");
        let model = OpenAiModel::new(client, None, "gpt-3.5-turbo", 0.3);
        let err = model.complete("hello").await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingApiKey));
    }

    #[test]
    fn test_api_error_display() {
        let err = ProviderError::ApiError {
            status: 429,
            message: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 429 - rate limited");
    }
}
