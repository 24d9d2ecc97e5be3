//! OpenRouter chat completion provider.
//!
//! Speaks the OpenAI-compatible `/chat/completions` and `/models` endpoints.

use super::{
    ChatMessage, ChatProvider, Completion, CompletionParams, ModelInfo, ProviderError, Usage,
};
use crate::config::OpenRouterConfig;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use service_core::observability::TracedClientExt;
use std::time::Duration;

/// OpenRouter provider.
pub struct OpenRouterProvider {
    client: Client,
    api_key: Secret<String>,
    base_url: String,
    referer: String,
    app_name: String,
}

impl OpenRouterProvider {
    pub fn new(config: &OpenRouterConfig) -> Result<Self, ProviderError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ProviderError::NotConfigured("OPENROUTER_API_KEY is not set".to_string())
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            referer: config.referer.clone(),
            app_name: config.app_name.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map non-success statuses; OpenRouter reports `{"error": {"message": ..}}`.
    async fn check_status(response: Response) -> Result<Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::Api {
            status: status.as_u16(),
            message: error_message(&body).unwrap_or(body),
        })
    }

    async fn get_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let response = self
            .client
            .traced_get(&self.url("/models"))
            .bearer_auth(self.api_key.expose_secret())
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.app_name)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let body: ModelsResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(body.data)
    }
}

fn error_message(body: &str) -> Option<String> {
    let parsed: ErrorEnvelope = serde_json::from_str(body).ok()?;
    Some(parsed.error.message)
}

#[async_trait]
impl ChatProvider for OpenRouterProvider {
    fn name(&self) -> &'static str {
        "openrouter"
    }

    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &CompletionParams,
    ) -> Result<Completion, ProviderError> {
        let request = CompletionRequest {
            model,
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
        };

        tracing::debug!(
            model = %model,
            message_count = messages.len(),
            "Sending request to OpenRouter"
        );

        let response = self
            .client
            .traced_post(&self.url("/chat/completions"))
            .bearer_auth(self.api_key.expose_secret())
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.app_name)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let body: CompletionResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let reply = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(ProviderError::EmptyResponse)?;

        Ok(Completion {
            reply,
            usage: body.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        self.get_models().await
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.get_models().await.map(|_| ())
    }
}

// OpenRouter wire types

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ModelsResponse {
    data: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}
