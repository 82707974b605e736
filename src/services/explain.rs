//! Explanation service: template-first text for conflict sets and mined
//! critiques, optionally polished by an LLM.
//!
//! The template is always produced and always stands on its own; the LLM
//! polishes wording, never decides content. An absent, failing, or slow
//! provider downgrades to the template with a warning.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::LlmConfig;
use crate::models::*;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request timed out after {0}s")]
    Timeout(u64),

    #[error("LLM API error: {0}")]
    Api(String),

    #[error("LLM response parse error: {0}")]
    Parse(String),
}

/// Optional natural-language polish. `Ok(None)` means the provider chose
/// not to answer; callers keep the template either way.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: &str,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Option<String>, LlmError>;
}

// ============================================================================
// OpenAI-compatible provider
// ============================================================================

/// Chat-completions client, compatible with OpenAI-style APIs.
pub struct OpenAiCompatProvider {
    http_client: Client,
    config: LlmConfig,
}

impl OpenAiCompatProvider {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()
            .map_err(|e| LlmError::Api(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http_client, config })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: &str,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Option<String>, LlmError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Ok(None);
        };

        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: system_prompt.to_string() },
                ChatMessage { role: "user".to_string(), content: prompt.to_string() },
            ],
            max_tokens: Some(max_tokens),
            temperature: Some(self.config.temperature),
        };
        let url = format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'));

        tracing::debug!("Calling LLM API: {} with model {}", url, self.config.model);
        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(timeout.as_secs())
                } else {
                    LlmError::Api(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(LlmError::Api(format!("API error {status}: {body}")));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

// ============================================================================
// Explanation service
// ============================================================================

const CONFLICT_SYSTEM_PROMPT: &str = "You rewrite hiring-search conflict analyses into one \
short, plain-English paragraph. Keep every number exactly as given. Do not add advice.";

const POLISH_MAX_TOKENS: u32 = 256;

pub struct ExplanationService {
    provider: Option<Arc<dyn LlmProvider>>,
    timeout: Duration,
}

impl ExplanationService {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, timeout_seconds: u64) -> Self {
        Self { provider, timeout: Duration::from_secs(timeout_seconds.max(1)) }
    }

    /// Deterministic template for one conflict set.
    pub fn conflict_template(set: &ConflictSet) -> String {
        let members: Vec<String> = set
            .constraints
            .iter()
            .map(|c| c.display_value.clone())
            .collect();
        let mut text = format!(
            "These constraints conflict: {}. Together they match {} engineer(s).",
            members.join(" + "),
            set.count_matching_all
        );
        for entry in &set.stats {
            text.push_str(&format!(
                " Alone, `{}` matches {} engineer(s).",
                entry.constraint_id,
                entry.stats.count_matching()
            ));
        }
        text
    }

    /// Fill `explanation` on each conflict set: template always, LLM
    /// polish when available. Returns warnings for any downgrade.
    pub async fn explain_conflicts(&self, sets: &mut [ConflictSet]) -> Vec<String> {
        let mut warnings = Vec::new();
        for set in sets.iter_mut() {
            let template = Self::conflict_template(set);
            let polished = match &self.provider {
                Some(provider) => {
                    match provider
                        .generate(&template, CONFLICT_SYSTEM_PROMPT, POLISH_MAX_TOKENS, self.timeout)
                        .await
                    {
                        Ok(Some(text)) => Some(text),
                        Ok(None) => None,
                        Err(e) => {
                            tracing::warn!("LLM polish unavailable, keeping template: {e}");
                            warnings
                                .push(format!("LLM unavailable, template explanation used: {e}"));
                            None
                        }
                    }
                }
                None => None,
            };
            set.explanation = Some(polished.unwrap_or(template));
        }
        warnings
    }

    /// Fill `narrative` on relaxation suggestions the same way.
    pub async fn explain_relaxations(
        &self,
        suggestions: &mut [RelaxationSuggestion],
    ) -> Vec<String> {
        let mut warnings = Vec::new();
        for suggestion in suggestions.iter_mut() {
            let template = format!(
                "{} — projected result count: {}.",
                suggestion.description, suggestion.new_count
            );
            let polished = match &self.provider {
                Some(provider) => match provider
                    .generate(&template, CONFLICT_SYSTEM_PROMPT, POLISH_MAX_TOKENS, self.timeout)
                    .await
                {
                    Ok(text) => text,
                    Err(e) => {
                        warnings.push(format!("LLM unavailable, template narrative used: {e}"));
                        None
                    }
                },
                None => None,
            };
            suggestion.narrative = Some(polished.unwrap_or(template));
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FailingProvider;

    #[async_trait]
    impl LlmProvider for FailingProvider {
        async fn generate(
            &self,
            _prompt: &str,
            _system_prompt: &str,
            _max_tokens: u32,
            _timeout: Duration,
        ) -> Result<Option<String>, LlmError> {
            Err(LlmError::Timeout(1))
        }
    }

    struct EchoProvider;

    #[async_trait]
    impl LlmProvider for EchoProvider {
        async fn generate(
            &self,
            prompt: &str,
            _system_prompt: &str,
            _max_tokens: u32,
            _timeout: Duration,
        ) -> Result<Option<String>, LlmError> {
            Ok(Some(format!("Polished: {prompt}")))
        }
    }

    fn conflict_set() -> ConflictSet {
        ConflictSet {
            constraints: vec![TestableConstraint {
                id: "filter:salary".into(),
                display_value: "Salary ≤ $120,000".into(),
                source: ConstraintSource::User,
                kind: ConstraintKind::Property {
                    field: FilterField::Salary,
                    op: FilterOp::Lte,
                    value: json!(120_000),
                    field_type: PropertyFieldType::Number,
                },
            }],
            stats: vec![ConstraintStatsEntry {
                constraint_id: "filter:salary".into(),
                stats: ConstraintStats::Fallback { count_matching: 4 },
            }],
            count_matching_all: 0,
            explanation: None,
        }
    }

    #[tokio::test]
    async fn template_stands_without_a_provider() {
        let service = ExplanationService::new(None, 5);
        let mut sets = vec![conflict_set()];
        let warnings = service.explain_conflicts(&mut sets).await;
        assert!(warnings.is_empty());
        let text = sets[0].explanation.as_ref().unwrap();
        assert!(text.contains("Salary ≤ $120,000"));
        assert!(text.contains("0 engineer"));
        assert!(text.contains("4 engineer"));
    }

    #[tokio::test]
    async fn provider_failure_downgrades_with_a_warning() {
        let service = ExplanationService::new(Some(Arc::new(FailingProvider)), 5);
        let mut sets = vec![conflict_set()];
        let warnings = service.explain_conflicts(&mut sets).await;
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("LLM unavailable"));
        // The template still stands.
        assert!(sets[0].explanation.as_ref().unwrap().contains("Salary"));
    }

    #[tokio::test]
    async fn provider_polish_replaces_the_template_text() {
        let service = ExplanationService::new(Some(Arc::new(EchoProvider)), 5);
        let mut sets = vec![conflict_set()];
        let warnings = service.explain_conflicts(&mut sets).await;
        assert!(warnings.is_empty());
        assert!(sets[0].explanation.as_ref().unwrap().starts_with("Polished:"));
    }
}
