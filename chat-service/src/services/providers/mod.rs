//! Upstream model client abstraction.
//!
//! The orchestrator talks to a `ChatProvider`; OpenRouter is the production
//! backend and the mock provider stands in when no API key is configured.

pub mod mock;
pub mod openrouter;

pub use mock::MockChatProvider;
pub use openrouter::OpenRouterProvider;

use crate::models::{Role, TokenUsage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited by upstream")]
    RateLimited,

    #[error("Network error: {0}")]
    Network(String),

    #[error("No response received from the model")]
    EmptyResponse,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// One entry of the conversation sent upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Sampling parameters for a completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: 0.7,
            top_p: 1.0,
        }
    }
}

/// Token usage as reported by the upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl From<Usage> for TokenUsage {
    fn from(usage: Usage) -> Self {
        TokenUsage::new(usage.prompt_tokens, usage.completion_tokens, usage.total_tokens)
    }
}

/// A finished completion.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub reply: String,
    /// `None` when the upstream did not report usage.
    pub usage: Option<Usage>,
}

/// Per-token prices, as decimal strings in USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub prompt: String,
    pub completion: String,
}

impl ModelPricing {
    /// Unparsable prices read as zero.
    fn rate(raw: &str) -> f64 {
        raw.trim().parse().unwrap_or(0.0)
    }

    pub fn prompt_rate(&self) -> f64 {
        Self::rate(&self.prompt)
    }

    pub fn completion_rate(&self) -> f64 {
        Self::rate(&self.completion)
    }
}

/// A catalogue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub context_length: u64,
    pub pricing: ModelPricing,
}

/// Catalogue filter; every set criterion must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelFilter {
    /// Upper bound on both the prompt and the completion price.
    pub max_price: Option<f64>,
    pub min_context_length: Option<u64>,
    /// Vendor prefix of the model id, e.g. `openai`.
    pub provider: Option<String>,
    /// Case-insensitive substring of id, name or description.
    pub search: Option<String>,
}

impl ModelFilter {
    pub fn matches(&self, model: &ModelInfo) -> bool {
        if let Some(max_price) = self.max_price {
            if model.pricing.prompt_rate() > max_price
                || model.pricing.completion_rate() > max_price
            {
                return false;
            }
        }

        if let Some(min_context) = self.min_context_length {
            if model.context_length < min_context {
                return false;
            }
        }

        if let Some(provider) = self.provider.as_deref().filter(|p| !p.is_empty()) {
            let prefix = format!("{}/", provider.to_lowercase());
            if !model.id.to_lowercase().starts_with(&prefix) {
                return false;
            }
        }

        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let hit = model.id.to_lowercase().contains(&needle)
                || model.name.to_lowercase().contains(&needle)
                || model
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        true
    }

    pub fn apply(&self, models: Vec<ModelInfo>) -> Vec<ModelInfo> {
        models.into_iter().filter(|m| self.matches(m)).collect()
    }
}

/// Estimated spend for a request against one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub prompt_cost: f64,
    pub completion_cost: f64,
    pub total_cost: f64,
}

impl CostEstimate {
    pub fn for_model(model: &ModelInfo, prompt_tokens: u64, completion_tokens: u64) -> Self {
        let prompt_cost = model.pricing.prompt_rate() * prompt_tokens as f64;
        let completion_cost = model.pricing.completion_rate() * completion_tokens as f64;
        Self {
            prompt_cost,
            completion_cost,
            total_cost: prompt_cost + completion_cost,
        }
    }
}

/// Trait for chat completion backends.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Short backend name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Whether replies are simulated rather than produced by a real model.
    fn is_simulated(&self) -> bool {
        false
    }

    /// Complete the conversation in `messages` (oldest first).
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &CompletionParams,
    ) -> Result<Completion, ProviderError>;

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError>;

    async fn health_check(&self) -> Result<(), ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(id: &str, name: &str, context: u64, prompt: &str, completion: &str) -> ModelInfo {
        ModelInfo {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            context_length: context,
            pricing: ModelPricing {
                prompt: prompt.to_string(),
                completion: completion.to_string(),
            },
        }
    }

    fn catalogue() -> Vec<ModelInfo> {
        vec![
            model("openai/gpt-3.5-turbo", "GPT-3.5 Turbo", 4096, "0.001", "0.002"),
            model("openai/gpt-4", "GPT-4", 8192, "0.03", "0.06"),
            model("mistral/mistral-small", "Mistral Small", 32000, "0", "0"),
        ]
    }

    fn ids(models: &[ModelInfo]) -> Vec<&str> {
        models.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn empty_filter_keeps_everything() {
        assert_eq!(ModelFilter::default().apply(catalogue()).len(), 3);
    }

    #[test]
    fn max_price_checks_both_rates() {
        let filter = ModelFilter {
            max_price: Some(0.01),
            ..Default::default()
        };
        let kept = filter.apply(catalogue());
        assert_eq!(ids(&kept), vec!["openai/gpt-3.5-turbo", "mistral/mistral-small"]);
    }

    #[test]
    fn provider_and_context_combine() {
        let filter = ModelFilter {
            provider: Some("OpenAI".to_string()),
            min_context_length: Some(8000),
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(catalogue())), vec!["openai/gpt-4"]);
    }

    #[test]
    fn search_looks_at_description_too() {
        let mut models = catalogue();
        models[2].description = Some("Good for free experiments".to_string());
        let filter = ModelFilter {
            search: Some("FREE".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(models)), vec!["mistral/mistral-small"]);
    }

    #[test]
    fn cost_is_rate_times_tokens() {
        let gpt4 = model("openai/gpt-4", "GPT-4", 8192, "0.00003", "0.00006");
        let cost = CostEstimate::for_model(&gpt4, 1000, 500);
        assert!((cost.prompt_cost - 0.03).abs() < 1e-9);
        assert!((cost.completion_cost - 0.03).abs() < 1e-9);
        assert!((cost.total_cost - 0.06).abs() < 1e-9);
    }

    #[test]
    fn usage_converts_to_token_counters() {
        let usage = Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        };
        assert_eq!(TokenUsage::from(usage), TokenUsage::new(10, 5, 15));
    }
}
