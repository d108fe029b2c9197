// AI Provider Service
// HTTP clients for the language models used as the comparison oracle

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;

const GEMINI_DEFAULT_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const GLM_DEFAULT_URL: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";
const DEEPSEEK_DEFAULT_URL: &str = "https://api.deepseek.com/chat/completions";
const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_DEFAULT_URL: &str = "https://api.anthropic.com/v1/messages";

const HTTP_TIMEOUT_SECS: u64 = 80;

/// Providers tried, in order, when none is requested explicitly.
pub const PROVIDER_PREFERENCE: [&str; 4] = ["gemini", "glm", "deepseek", "openai"];

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
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub name: String,
    pub model: String,
}

pub fn parse_provider(spec: &str) -> ProviderSpec {
    let parts: Vec<&str> = spec.splitn(2, ':').collect();
    if parts.len() == 2 {
        ProviderSpec {
            name: parts[0].trim().to_lowercase(),
            model: parts[1].trim().to_string(),
        }
    } else {
        ProviderSpec {
            name: spec.trim().to_lowercase(),
            model: String::new(),
        }
    }
}

/// Default model per provider, `None` for unknown providers.
pub fn default_model(provider: &str) -> Option<&'static str> {
    match provider {
        "gemini" => Some("gemini-1.5-flash"),
        "glm" => Some("glm-4-flash"),
        "deepseek" => Some("deepseek-chat"),
        "openai" => Some("gpt-4o-mini"),
        "anthropic" | "claude" => Some("claude-3-5-haiku-latest"),
        _ => None,
    }
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
    max_tokens: i32,
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

pub struct ProviderClient {
    client: Client,
    gemini_url: String,
    glm_url: String,
    deepseek_url: String,
    openai_url: String,
    anthropic_url: String,
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
        Self::with_client(client)
    }

    pub fn with_proxy(proxy_url: &str) -> Result<Self, ProviderError> {
        let proxy = reqwest::Proxy::all(proxy_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .proxy(proxy)
            .build()?;
        Ok(Self::with_client(client))
    }

    fn with_client(client: Client) -> Self {
        Self {
            client,
            gemini_url: env::var("GEMINI_API_URL").unwrap_or_else(|_| GEMINI_DEFAULT_URL.to_string()),
            glm_url: env::var("GLM_API_URL").unwrap_or_else(|_| GLM_DEFAULT_URL.to_string()),
            deepseek_url: env::var("DEEPSEEK_API_URL").unwrap_or_else(|_| DEEPSEEK_DEFAULT_URL.to_string()),
            openai_url: env::var("OPENAI_API_URL").unwrap_or_else(|_| OPENAI_DEFAULT_URL.to_string()),
            anthropic_url: env::var("ANTHROPIC_API_URL").unwrap_or_else(|_| ANTHROPIC_DEFAULT_URL.to_string()),
        }
    }

    /// Override a provider endpoint (from the config file).
    pub fn set_base_url(&mut self, provider: &str, url: &str) -> Result<(), ProviderError> {
        let slot = match provider {
            "gemini" => &mut self.gemini_url,
            "glm" => &mut self.glm_url,
            "deepseek" => &mut self.deepseek_url,
            "openai" => &mut self.openai_url,
            "anthropic" | "claude" => &mut self.anthropic_url,
            other => return Err(ProviderError::UnsupportedProvider(other.to_string())),
        };
        *slot = url.trim_end_matches('/').to_string();
        Ok(())
    }

    pub fn base_url(&self, provider: &str) -> Option<&str> {
        match provider {
            "gemini" => Some(&self.gemini_url),
            "glm" => Some(&self.glm_url),
            "deepseek" => Some(&self.deepseek_url),
            "openai" => Some(&self.openai_url),
            "anthropic" | "claude" => Some(&self.anthropic_url),
            _ => None,
        }
    }

    /// Ask `provider` for a JSON answer to `system` + `user`.
    pub async fn complete_json(
        &self,
        provider: &str,
        model: &str,
        api_key: &str,
        system: &str,
        user: &str,
        max_tokens: i32,
    ) -> Result<ChatResult, ProviderError> {
        match provider {
            "gemini" => self.call_gemini(model, api_key, system, user, max_tokens).await,
            "glm" => self.call_chat_api(&self.glm_url, model, api_key, system, user, max_tokens).await,
            "deepseek" => {
                self.call_chat_api(&self.deepseek_url, model, api_key, system, user, max_tokens)
                    .await
            }
            "openai" => self.call_chat_api(&self.openai_url, model, api_key, system, user, max_tokens).await,
            "anthropic" | "claude" => {
                self.call_anthropic(model, api_key, system, user, max_tokens).await
            }
            other => Err(ProviderError::UnsupportedProvider(other.to_string())),
        }
    }

    async fn call_gemini(
        &self,
        model: &str,
        api_key: &str,
        system: &str,
        user: &str,
        max_tokens: i32,
    ) -> Result<ChatResult, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.gemini_url, model);
        let request = serde_json::json!({
            "systemInstruction": { "parts": [{ "text": system }] },
            "contents": [{ "role": "user", "parts": [{ "text": user }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "temperature": 0.0,
                "maxOutputTokens": max_tokens
            }
        });

        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
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

        // {"candidates":[{"content":{"parts":[{"text":"..."}]}}]}
        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let content = data["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult { content, latency_ms })
    }

    async fn call_anthropic(
        &self,
        model: &str,
        api_key: &str,
        system: &str,
        user: &str,
        max_tokens: i32,
    ) -> Result<ChatResult, ProviderError> {
        #[derive(Serialize)]
        struct AnthropicRequest<'a> {
            model: &'a str,
            max_tokens: i32,
            system: &'a str,
            messages: Vec<ChatMessage>,
        }

        #[derive(Deserialize)]
        struct AnthropicResponse {
            content: Option<Vec<AnthropicContent>>,
        }

        #[derive(Deserialize)]
        struct AnthropicContent {
            text: Option<String>,
        }

        let request = AnthropicRequest {
            model,
            max_tokens,
            system,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: user.to_string(),
            }],
        };

        let start = Instant::now();

        let response = self
            .client
            .post(&self.anthropic_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
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

        let data: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let content = data
            .content
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.text)
            .ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult { content, latency_ms })
    }

    /// OpenAI-compatible chat completion endpoint (GLM, DeepSeek, OpenAI).
    async fn call_chat_api(
        &self,
        url: &str,
        model: &str,
        api_key: &str,
        system: &str,
        user: &str,
        max_tokens: i32,
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
            max_tokens,
            temperature: 0.0,
            // Prompts always mention JSON, which json_object mode requires.
            response_format: Some(ResponseFormat {
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

        Ok(ChatResult { content, latency_ms })
    }
}

/// Environment variables checked for a provider's API key, in order.
pub fn api_key_env_vars(provider: &str) -> Vec<&'static str> {
    match provider {
        "gemini" => vec!["GEMINI_API_KEY", "CONTRACTMATCH_GEMINI_API_KEY"],
        "glm" => vec!["GLM_API_KEY", "CONTRACTMATCH_GLM_API_KEY"],
        "deepseek" => vec!["DEEPSEEK_API_KEY", "CONTRACTMATCH_DEEPSEEK_API_KEY"],
        "openai" => vec!["OPENAI_API_KEY", "CONTRACTMATCH_OPENAI_API_KEY"],
        "anthropic" | "claude" => vec!["ANTHROPIC_API_KEY", "CONTRACTMATCH_ANTHROPIC_API_KEY"],
        _ => vec![],
    }
}

/// Get API key from environment or the loaded config
pub fn get_api_key(provider: &str, config_keys: &std::collections::HashMap<String, String>) -> Option<String> {
    for key in api_key_env_vars(provider) {
        if let Ok(val) = env::var(key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    config_keys
        .get(provider)
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider() {
        let spec = parse_provider("gemini:gemini-1.5-pro");
        assert_eq!(spec.name, "gemini");
        assert_eq!(spec.model, "gemini-1.5-pro");

        let spec2 = parse_provider(" DeepSeek ");
        assert_eq!(spec2.name, "deepseek");
        assert_eq!(spec2.model, "");
    }

    #[test]
    fn test_default_models() {
        assert_eq!(default_model("gemini"), Some("gemini-1.5-flash"));
        assert_eq!(default_model("claude"), default_model("anthropic"));
        assert!(default_model("mistral").is_none());
    }

    #[test]
    fn test_provider_client_base_urls() {
        let mut client = ProviderClient::new();
        assert!(client.base_url("glm").unwrap().contains("bigmodel.cn"));
        client.set_base_url("gemini", "http://localhost:8080/v1beta/").unwrap();
        assert_eq!(client.base_url("gemini"), Some("http://localhost:8080/v1beta"));
        assert!(matches!(
            client.set_base_url("mistral", "http://x"),
            Err(ProviderError::UnsupportedProvider(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_provider_fails_without_network() {
        let client = ProviderClient::new();
        let res = client.complete_json("mistral", "m", "k", "sys", "user", 16).await;
        assert!(matches!(res, Err(ProviderError::UnsupportedProvider(_))));
    }

    #[test]
    fn test_config_key_fallback_ignores_blank_keys() {
        let mut keys = std::collections::HashMap::new();
        keys.insert("unknown-provider".to_string(), "  ".to_string());
        assert!(get_api_key("unknown-provider", &keys).is_none());
        keys.insert("unknown-provider".to_string(), " secret ".to_string());
        assert_eq!(get_api_key("unknown-provider", &keys).as_deref(), Some("secret"));
    }
}
