// Oracle Adapter
// Semantic judge consulted for ambiguous paragraph pairs. The engine only sees
// validated `Judgment`s; anything the model returns outside the verdict
// contract surfaces as an `OracleError`.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::services::config_store::{AppConfig, ModelSelectionPolicy};
use crate::services::providers::{
    default_model, get_api_key, parse_provider, ProviderClient, ProviderError, PROVIDER_PREFERENCE,
};

use super::error::ConfigurationError;

const ORACLE_MAX_TOKENS: i32 = 512;

/// System prompt for a single paragraph-pair judgment
const ORACLE_SYSTEM_PROMPT: &str = r#"You are a legal contract comparison engine. You compare one paragraph of "Contract V1" (reservation contract) with the paragraph of "Contract V2" (final deed) it was aligned with.

Return ONLY a valid JSON object, no markdown formatting, no preamble:
{"verdict": "unchanged" | "modified" | "moved" | "anomaly", "explanation": "short explanation, in the language of the contract"}

Rules for the verdict:
- unchanged: same legal meaning; only negligible wording, punctuation or whitespace differences.
- modified: specific words, obligations, conditions or parties changed.
- moved: the paragraph is substantially the same but sits in a significantly different location or section.
- anomaly: amounts, percentages, dates or deadlines are inconsistent between V1 and V2."#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Unchanged,
    Modified,
    Moved,
    /// Conflicting numeric values or dates.
    Anomaly,
}

impl Verdict {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "unchanged" | "identical" | "same" => Some(Self::Unchanged),
            "modified" | "changed" => Some(Self::Modified),
            "moved" => Some(Self::Moved),
            "anomaly" | "inconsistency" | "inconsistent" => Some(Self::Anomaly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Judgment {
    pub verdict: Verdict,
    pub explanation: String,
}

/// Extra information passed along with a pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct JudgeContext<'a> {
    pub domain_hints: Option<&'a str>,
    pub source_index: usize,
    pub source_count: usize,
    pub target_index: usize,
    pub target_count: usize,
    pub similarity: f64,
}

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("oracle transport failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("oracle timed out after {millis} ms")]
    Timeout { millis: u64 },
    #[error("unparseable oracle response: {0}")]
    InvalidResponse(String),
    #[error("unknown oracle verdict: {0}")]
    UnknownVerdict(String),
}

/// External semantic judge. Calls are made one at a time, in document order.
#[allow(async_fn_in_trait)]
pub trait Oracle {
    async fn judge(
        &self,
        source_text: &str,
        target_text: &str,
        context: &JudgeContext<'_>,
    ) -> Result<Judgment, OracleError>;
}

impl<T: Oracle> Oracle for &T {
    async fn judge(
        &self,
        source_text: &str,
        target_text: &str,
        context: &JudgeContext<'_>,
    ) -> Result<Judgment, OracleError> {
        (**self).judge(source_text, target_text, context).await
    }
}

#[derive(Debug, Deserialize)]
struct RawJudgment {
    #[serde(alias = "type", alias = "category")]
    verdict: String,
    #[serde(default, alias = "reasoning")]
    explanation: Option<String>,
}

/// Validate a model response against the verdict contract.
pub fn parse_judgment(content: &str) -> Result<Judgment, OracleError> {
    let json_str = extract_json(content.trim())?;
    let raw: RawJudgment = serde_json::from_str(&json_str)
        .map_err(|e| OracleError::InvalidResponse(format!("JSON parse error: {}", e)))?;
    let verdict = Verdict::parse(&raw.verdict).ok_or(OracleError::UnknownVerdict(raw.verdict))?;
    Ok(Judgment {
        verdict,
        explanation: raw.explanation.unwrap_or_default().trim().to_string(),
    })
}

/// Extract JSON from response content
fn extract_json(content: &str) -> Result<String, OracleError> {
    if content.starts_with('{') {
        Ok(content.to_string())
    } else if let Some(start) = content.find('{') {
        match content.rfind('}') {
            Some(end) if end > start => Ok(content[start..=end].to_string()),
            _ => Err(OracleError::InvalidResponse("Invalid JSON response".to_string())),
        }
    } else {
        Err(OracleError::InvalidResponse("No JSON in response".to_string()))
    }
}

fn build_user_prompt(source_text: &str, target_text: &str, context: &JudgeContext<'_>) -> String {
    let mut prompt = String::new();
    if let Some(hints) = context.domain_hints {
        prompt.push_str(&format!("Context: {}\n\n", hints));
    }
    prompt.push_str(&format!(
        "Character similarity: {:.0}%\n\n--- CONTRACT V1, paragraph {} of {} ---\n{}\n\n--- CONTRACT V2, paragraph {} of {} ---\n{}\n\nAnswer in JSON.",
        context.similarity * 100.0,
        context.source_index + 1,
        context.source_count,
        source_text,
        context.target_index + 1,
        context.target_count,
        target_text
    ));
    prompt
}

/// Provider chosen for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProvider {
    pub name: String,
    pub model: String,
    pub api_key: String,
}

/// Pick a provider and its key. An explicit request must resolve; otherwise
/// the first provider with a key wins.
pub fn resolve_provider<F>(requested: Option<&str>, lookup_key: F) -> Result<ResolvedProvider, ConfigurationError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(spec) = requested.filter(|s| !s.trim().is_empty()) {
        let spec = parse_provider(spec);
        let fallback_model = default_model(&spec.name)
            .ok_or_else(|| ConfigurationError::UnknownProvider(spec.name.clone()))?;
        let api_key = lookup_key(&spec.name).ok_or_else(|| ConfigurationError::MissingApiKey(spec.name.clone()))?;
        let model = if spec.model.is_empty() {
            fallback_model.to_string()
        } else {
            spec.model
        };
        return Ok(ResolvedProvider {
            name: spec.name,
            model,
            api_key,
        });
    }

    for name in PROVIDER_PREFERENCE {
        if let (Some(api_key), Some(model)) = (lookup_key(name), default_model(name)) {
            return Ok(ResolvedProvider {
                name: name.to_string(),
                model: model.to_string(),
                api_key,
            });
        }
    }

    Err(ConfigurationError::NoProviderAvailable(PROVIDER_PREFERENCE.join(", ")))
}

/// Oracle backed by a language model provider, with per-call timeout and retries.
pub struct LlmOracle {
    client: ProviderClient,
    provider: ResolvedProvider,
    model_selection: ModelSelectionPolicy,
    timeout: Duration,
    max_attempts: usize,
}

impl LlmOracle {
    pub fn new(
        client: ProviderClient,
        provider: ResolvedProvider,
        model_selection: ModelSelectionPolicy,
        timeout: Duration,
        max_attempts: usize,
    ) -> Result<Self, ConfigurationError> {
        if max_attempts == 0 {
            return Err(ConfigurationError::InvalidOracleSettings(
                "oracleMaxAttempts must be at least 1".to_string(),
            ));
        }
        if timeout.is_zero() {
            return Err(ConfigurationError::InvalidOracleSettings(
                "oracleTimeoutSecs must be positive".to_string(),
            ));
        }
        Ok(Self {
            client,
            provider,
            model_selection,
            timeout,
            max_attempts,
        })
    }

    /// Build from the app config. `provider_override` takes precedence over
    /// `defaultProvider`; configured models and base URLs are applied.
    pub fn from_config(config: &AppConfig, provider_override: Option<&str>) -> Result<Self, ConfigurationError> {
        let requested = provider_override.or(config.default_provider.as_deref());
        let mut provider = resolve_provider(requested, |name| get_api_key(name, &config.api_keys))?;

        let provider_config = config.providers.get(&provider.name);
        let explicit_model = requested.map(|r| !parse_provider(r).model.is_empty()).unwrap_or(false);
        if !explicit_model {
            if let Some(model) = provider_config.and_then(|p| p.model.clone()) {
                provider.model = model;
            }
        }

        let mut client = match config.proxy.as_ref().and_then(|p| p.active_url()) {
            Some(proxy_url) => ProviderClient::with_proxy(proxy_url)
                .map_err(|e| ConfigurationError::InvalidOracleSettings(format!("proxy: {}", e)))?,
            None => ProviderClient::new(),
        };
        if let Some(url) = provider_config.and_then(|p| p.base_url.as_deref()) {
            client
                .set_base_url(&provider.name, url)
                .map_err(|e| ConfigurationError::InvalidOracleSettings(e.to_string()))?;
        }

        info!(
            "[ORACLE] provider={} model={} policy={:?}",
            provider.name, provider.model, config.comparison.model_selection
        );

        Self::new(
            client,
            provider,
            config.comparison.model_selection.clone(),
            Duration::from_secs(config.comparison.oracle_timeout_secs),
            config.comparison.oracle_max_attempts,
        )
    }

    pub fn provider(&self) -> &ResolvedProvider {
        &self.provider
    }
}

impl Oracle for LlmOracle {
    async fn judge(
        &self,
        source_text: &str,
        target_text: &str,
        context: &JudgeContext<'_>,
    ) -> Result<Judgment, OracleError> {
        let model = self
            .model_selection
            .select(&self.provider.model, source_text, target_text);
        let user_prompt = build_user_prompt(source_text, target_text, context);
        let mut last_err: Option<OracleError> = None;

        for attempt in 1..=self.max_attempts {
            let fut = self.client.complete_json(
                &self.provider.name,
                model,
                &self.provider.api_key,
                ORACLE_SYSTEM_PROMPT,
                &user_prompt,
                ORACLE_MAX_TOKENS,
            );

            let err = match tokio::time::timeout(self.timeout, fut).await {
                Ok(Ok(chat_result)) => match parse_judgment(&chat_result.content) {
                    Ok(judgment) => {
                        info!(
                            "[ORACLE] ok model={} target={} attempt={} latency_ms={} verdict={:?}",
                            model, context.target_index, attempt, chat_result.latency_ms, judgment.verdict
                        );
                        return Ok(judgment);
                    }
                    Err(e) => {
                        debug!("[ORACLE] raw response: {}", chat_result.content);
                        e
                    }
                },
                Ok(Err(e)) => OracleError::Provider(e),
                Err(_) => OracleError::Timeout {
                    millis: self.timeout.as_millis() as u64,
                },
            };

            warn!(
                "[ORACLE] error model={} target={} attempt={}/{} : {}",
                model, context.target_index, attempt, self.max_attempts, err
            );
            last_err = Some(err);

            if attempt < self.max_attempts {
                // Linear backoff against rate limits and transient failures.
                let backoff_ms = 400u64 * attempt as u64;
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
        }

        Err(last_err.unwrap_or_else(|| OracleError::InvalidResponse("no attempt made".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_judgment_plain_json() {
        let j = parse_judgment(r#"{"verdict": "anomaly", "explanation": "Prix passé de 250.000 à 255.000"}"#).unwrap();
        assert_eq!(j.verdict, Verdict::Anomaly);
        assert!(j.explanation.contains("255.000"));
    }

    #[test]
    fn test_parse_judgment_wrapped_in_markdown() {
        let content = "```json\n{\"type\": \"Moved\"}\n```";
        let j = parse_judgment(content).unwrap();
        assert_eq!(j.verdict, Verdict::Moved);
        assert_eq!(j.explanation, "");
    }

    #[test]
    fn test_parse_judgment_rejects_unknown_verdict() {
        let err = parse_judgment(r#"{"verdict": "added"}"#).unwrap_err();
        assert!(matches!(err, OracleError::UnknownVerdict(v) if v == "added"));
    }

    #[test]
    fn test_parse_judgment_rejects_non_json() {
        assert!(matches!(
            parse_judgment("I think they are the same."),
            Err(OracleError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_judgment("{\"explanation\": \"missing verdict\"}"),
            Err(OracleError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_user_prompt_includes_positions_and_hints() {
        let ctx = JudgeContext {
            domain_hints: Some("VEFA"),
            source_index: 0,
            source_count: 3,
            target_index: 1,
            target_count: 4,
            similarity: 0.9,
        };
        let prompt = build_user_prompt("A", "B", &ctx);
        assert!(prompt.starts_with("Context: VEFA"));
        assert!(prompt.contains("paragraph 1 of 3"));
        assert!(prompt.contains("paragraph 2 of 4"));
        assert!(prompt.contains("90%"));
    }

    #[test]
    fn test_resolve_provider_explicit() {
        let resolved = resolve_provider(Some("gemini:gemini-1.5-pro"), |_| Some("k".to_string())).unwrap();
        assert_eq!(resolved.name, "gemini");
        assert_eq!(resolved.model, "gemini-1.5-pro");

        let missing = resolve_provider(Some("glm"), |_| None);
        assert!(matches!(missing, Err(ConfigurationError::MissingApiKey(p)) if p == "glm"));

        let unknown = resolve_provider(Some("mistral"), |_| Some("k".to_string()));
        assert!(matches!(unknown, Err(ConfigurationError::UnknownProvider(_))));
    }

    #[test]
    fn test_resolve_provider_preference_order() {
        let keys: HashMap<&str, &str> = [("deepseek", "d"), ("openai", "o")].into_iter().collect();
        let resolved = resolve_provider(None, |name| keys.get(name).map(|k| k.to_string())).unwrap();
        assert_eq!(resolved.name, "deepseek");
        assert_eq!(resolved.model, "deepseek-chat");

        assert!(matches!(
            resolve_provider(None, |_| None),
            Err(ConfigurationError::NoProviderAvailable(_))
        ));
    }

    #[test]
    fn test_llm_oracle_rejects_zero_attempts() {
        let provider = ResolvedProvider {
            name: "gemini".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key: "k".to_string(),
        };
        let res = LlmOracle::new(
            ProviderClient::new(),
            provider,
            ModelSelectionPolicy::default(),
            Duration::from_secs(10),
            0,
        );
        assert!(matches!(res, Err(ConfigurationError::InvalidOracleSettings(_))));
    }

    fn glm_oracle(base_url: &str, timeout: Duration, max_attempts: usize) -> LlmOracle {
        let mut client = ProviderClient::new();
        client.set_base_url("glm", base_url).unwrap();
        let provider = ResolvedProvider {
            name: "glm".to_string(),
            model: "glm-4-flash".to_string(),
            api_key: "k".to_string(),
        };
        LlmOracle::new(client, provider, ModelSelectionPolicy::default(), timeout, max_attempts).unwrap()
    }

    #[tokio::test]
    async fn test_unreachable_provider_retries_with_backoff() {
        let oracle = glm_oracle("http://127.0.0.1:1/chat", Duration::from_secs(5), 3);

        let started = std::time::Instant::now();
        let err = oracle
            .judge("Le prix est 250.000 euros.", "Le prix est 255.000 euros.", &JudgeContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::Provider(_)), "unexpected error: {:?}", err);
        // 400 ms + 800 ms between the three attempts
        assert!(started.elapsed() >= Duration::from_millis(1200));
    }

    #[tokio::test]
    async fn test_unreachable_provider_degrades_comparison() {
        use crate::models::{segments_from_texts, Category};
        use crate::services::comparison::{ContractComparator, Thresholds};

        let oracle = glm_oracle("http://127.0.0.1:1/chat", Duration::from_secs(5), 3);
        let cmp = ContractComparator::new(oracle, Thresholds::default());
        let source = segments_from_texts(["Le prix est 250.000 euros.", "Ce prix est ferme."]);
        let target = segments_from_texts(["Le prix est 255.000 euros.", "Ce prix est ferme."]);
        let report = cmp.compare(&source, &target).await.unwrap();

        assert_eq!(report.oracle_calls, 1);
        assert_eq!(report.classifications[0].category, Category::Modified);
        assert!(report.classifications[0].is_degraded());
        assert_eq!(report.classifications[1].category, Category::Unchanged);
        assert_eq!(report.summary.degraded, 1);
    }

    #[tokio::test]
    async fn test_silent_provider_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold connections without ever answering.
        let server = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                open.push(stream);
            }
        });

        let oracle = glm_oracle(&format!("http://{}/chat", addr), Duration::from_millis(200), 2);
        let started = std::time::Instant::now();
        let err = oracle
            .judge("Clause A.", "Clause B.", &JudgeContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::Timeout { millis: 200 }), "unexpected error: {:?}", err);
        // Two 200 ms attempts and one 400 ms backoff.
        assert!(started.elapsed() >= Duration::from_millis(800));
        server.abort();
    }

    #[test]
    fn test_from_config_applies_provider_model() {
        let mut config = AppConfig::default();
        config.default_provider = Some("glm".to_string());
        config.api_keys.insert("glm".to_string(), "secret".to_string());
        config.providers.insert(
            "glm".to_string(),
            crate::services::config_store::ProviderConfig {
                enabled: true,
                model: Some("glm-4-plus".to_string()),
                base_url: Some("http://localhost:1/chat".to_string()),
            },
        );
        let oracle = LlmOracle::from_config(&config, None).unwrap();
        assert_eq!(oracle.provider().name, "glm");
        assert_eq!(oracle.provider().model, "glm-4-plus");
        assert_eq!(oracle.client.base_url("glm"), Some("http://localhost:1/chat"));
    }
}
