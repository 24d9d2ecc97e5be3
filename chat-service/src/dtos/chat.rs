use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::providers::{ModelFilter, ModelInfo};
use crate::services::{ChatReply, ParamOverrides};

/// Attached to responses produced by the simulated provider.
pub const SIMULATED_NOTE: &str =
    "Mock response - configure OPENROUTER_API_KEY for real AI responses";

pub const SIMULATED_MODELS_NOTE: &str =
    "Using mock models - configure OPENROUTER_API_KEY for real models";

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    #[validate(length(max = 200, message = "Title must be at most 200 characters"))]
    pub title: Option<String>,

    pub model_id: Option<String>,

    pub initial_message: Option<String>,
}

/// Missing fields deserialize as empty and are rejected by the orchestrator.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub session_id: String,

    #[serde(default)]
    pub message: String,

    pub model_id: Option<String>,
}

/// Body of the sessionless `/message` and `/simple` routes.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessageRequest {
    #[serde(default)]
    pub model_id: String,

    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRequest {
    #[serde(default)]
    pub model_id: String,

    #[serde(default)]
    pub message: String,

    /// Earlier turns, alternating user and assistant.
    #[serde(default)]
    pub context: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOptions {
    #[validate(range(min = 1, message = "maxTokens must be at least 1"))]
    pub max_tokens: Option<u32>,

    #[validate(range(min = 0.0, max = 2.0, message = "temperature must be between 0 and 2"))]
    pub temperature: Option<f32>,

    #[validate(range(min = 0.0, max = 1.0, message = "topP must be between 0 and 1"))]
    pub top_p: Option<f32>,
}

impl From<CompletionOptions> for ParamOverrides {
    fn from(options: CompletionOptions) -> Self {
        ParamOverrides {
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    #[serde(default)]
    pub model_id: String,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    #[validate(nested)]
    pub options: CompletionOptions,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimateRequest {
    #[validate(length(min = 1, message = "modelId is required"))]
    pub model_id: String,

    pub prompt_tokens: u64,

    pub completion_tokens: u64,
}

#[derive(Debug, Serialize)]
pub struct ModelListResponse {
    pub success: bool,
    pub data: Vec<ModelInfo>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<ModelFilter>,
}

impl ModelListResponse {
    pub fn new(data: Vec<ModelInfo>) -> Self {
        Self {
            success: true,
            count: data.len(),
            data,
            note: None,
            filters: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReplyData {
    #[serde(flatten)]
    pub reply: ChatReply,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'static str>,
}

/// Payload of a sessionless reply; `note` is set when the reply is simulated.
#[derive(Debug, Serialize)]
pub struct Noted<T: Serialize> {
    #[serde(flatten)]
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'static str>,
}

/// `/simple` answers without the `data` envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleChatResponse {
    pub success: bool,
    pub model_id: String,
    pub message: String,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'static str>,
}
