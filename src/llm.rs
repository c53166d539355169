use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openai;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

pub const COMPLETION_MODEL: &str = "gpt-4o-mini";

const DETAIL_LIMIT: usize = 100;

/// Failure categories for a completion call, computed once at the provider
/// boundary. Response construction and log severity both key off this tag
/// instead of re-inspecting provider error text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    #[error("provider rejected the API key")]
    Auth,
    #[error("provider quota exceeded")]
    Quota,
    #[error("network failure reaching the provider")]
    Network,
    #[error("provider response was not valid JSON")]
    Malformed,
    #[error("provider call failed: {0}")]
    Other(String),
}

/// One-shot text completion at a caller-chosen sampling temperature. The
/// implementation is expected to ask the model for a JSON object body.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str, temperature: f64) -> Result<String, LlmError>;
}

/// Runs a completion and parses the body as JSON. A body that does not parse
/// is treated the same as a failed call, never propagated as a panic or a
/// distinct error path.
pub async fn complete_json(
    provider: &dyn CompletionProvider,
    prompt: &str,
    temperature: f64,
) -> Result<Value, LlmError> {
    let raw = provider.complete(prompt, temperature).await?;
    serde_json::from_str(&raw).map_err(|_| {
        error!("failed to parse completion body: {}", truncate(&raw, 200));
        LlmError::Malformed
    })
}

/// OpenAI-backed provider.
pub struct OpenAiCompletion {
    client: openai::Client,
}

impl OpenAiCompletion {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: openai::Client::new(api_key),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletion {
    async fn complete(&self, prompt: &str, temperature: f64) -> Result<String, LlmError> {
        let agent = self
            .client
            .agent(COMPLETION_MODEL)
            .temperature(temperature)
            .additional_params(json!({ "response_format": { "type": "json_object" } }))
            .build();
        agent
            .prompt(prompt)
            .await
            .map_err(|e| classify(&e.to_string()))
    }
}

/// Maps provider error text onto the tag taxonomy. This is the only place
/// that looks at the text; call sites match on the resulting tag.
fn classify(message: &str) -> LlmError {
    let lower = message.to_lowercase();
    if lower.contains("401")
        || lower.contains("unauthorized")
        || lower.contains("invalid api key")
        || lower.contains("incorrect api key")
    {
        LlmError::Auth
    } else if lower.contains("429") || lower.contains("quota") || lower.contains("rate limit") {
        LlmError::Quota
    } else if lower.contains("error sending request")
        || lower.contains("connection")
        || lower.contains("dns error")
        || lower.contains("timed out")
    {
        LlmError::Network
    } else {
        LlmError::Other(truncate(message, DETAIL_LIMIT).to_string())
    }
}

/// Character-boundary-safe prefix, for keeping diagnostics short.
pub fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_are_tagged() {
        assert_eq!(classify("401 Unauthorized"), LlmError::Auth);
        assert_eq!(classify("Incorrect API key provided"), LlmError::Auth);
    }

    #[test]
    fn quota_failures_are_tagged() {
        assert_eq!(classify("status 429: too many requests"), LlmError::Quota);
        assert_eq!(classify("You exceeded your current quota"), LlmError::Quota);
    }

    #[test]
    fn network_failures_are_tagged() {
        assert_eq!(classify("error sending request for url"), LlmError::Network);
        assert_eq!(classify("dns error: failed to lookup"), LlmError::Network);
        assert_eq!(classify("operation timed out"), LlmError::Network);
    }

    #[test]
    fn everything_else_keeps_a_truncated_detail() {
        let long = "x".repeat(500);
        match classify(&long) {
            LlmError::Other(detail) => assert_eq!(detail.chars().count(), DETAIL_LIMIT),
            other => panic!("unexpected tag: {other:?}"),
        }
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("short", 100), "short");
    }
}
