//! Mock provider used when no upstream API key is configured, and in tests.

use super::{
    ChatMessage, ChatProvider, Completion, CompletionParams, ModelInfo, ModelPricing,
    ProviderError, Usage,
};
use crate::models::Role;
use async_trait::async_trait;
use std::sync::Mutex;

/// Completion tokens reported for every simulated reply.
const MOCK_COMPLETION_TOKENS: u32 = 50;

/// A recorded `complete` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub params: CompletionParams,
}

/// Echoing provider with a fixed catalogue.
pub struct MockChatProvider {
    enabled: bool,
    last_request: Mutex<Option<RecordedRequest>>,
}

impl MockChatProvider {
    /// A disabled provider fails every call, which simulates an upstream outage.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            last_request: Mutex::new(None),
        }
    }

    /// The most recent conversation passed to `complete`.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }

    fn ensure_enabled(&self) -> Result<(), ProviderError> {
        if self.enabled {
            Ok(())
        } else {
            Err(ProviderError::NotConfigured(
                "Mock chat provider not enabled".to_string(),
            ))
        }
    }

    fn catalogue() -> Vec<ModelInfo> {
        let entry = |id: &str, name: &str, description: &str, context: u64, prompt: &str, completion: &str| {
            ModelInfo {
                id: id.to_string(),
                name: name.to_string(),
                description: Some(description.to_string()),
                context_length: context,
                pricing: ModelPricing {
                    prompt: prompt.to_string(),
                    completion: completion.to_string(),
                },
            }
        };

        vec![
            entry(
                "openai/gpt-3.5-turbo",
                "GPT-3.5 Turbo",
                "Fast and efficient model for most tasks",
                4096,
                "0.001",
                "0.002",
            ),
            entry(
                "openai/gpt-4",
                "GPT-4",
                "Most capable model for complex tasks",
                8192,
                "0.03",
                "0.06",
            ),
            entry(
                "cognitivecomputations/dolphin-mistral-24b-venice-edition:free",
                "Dolphin Mistral 24B (Free)",
                "Free model for testing",
                4096,
                "0",
                "0",
            ),
        ]
    }
}

impl Default for MockChatProvider {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_simulated(&self) -> bool {
        true
    }

    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &CompletionParams,
    ) -> Result<Completion, ProviderError> {
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(RecordedRequest {
                model: model.to_string(),
                messages: messages.to_vec(),
                params: *params,
            });
        }
        self.ensure_enabled()?;

        let prompt = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let prompt_tokens = prompt.chars().count() as u32;

        Ok(Completion {
            reply: format!(
                "Hello! I am a simulated assistant. I received your message: \"{}\". \
                 Configure OPENROUTER_API_KEY to get replies from a real model.",
                prompt
            ),
            usage: Some(Usage {
                prompt_tokens,
                completion_tokens: MOCK_COMPLETION_TOKENS,
                total_tokens: prompt_tokens + MOCK_COMPLETION_TOKENS,
            }),
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        self.ensure_enabled()?;
        Ok(Self::catalogue())
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.ensure_enabled()
    }
}
