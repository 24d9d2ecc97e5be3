//! Chat orchestrator.
//!
//! Turns a user message into a persisted, model-backed reply: the user turn
//! is stored first, the recent window is sent upstream, and the reply is
//! appended as an assistant turn.

use super::error::ChatError;
use super::metrics::{record_completion, record_tokens};
use super::providers::{
    ChatMessage, ChatProvider, Completion, CompletionParams, CostEstimate, ModelFilter,
    ModelInfo, ModelPricing, Usage,
};
use super::session_store::SessionStore;
use crate::config::ChatSettings;
use crate::models::{Message, NewMessage, Principal, Role, Session};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

const DEFAULT_START_TITLE: &str = "New Chat Session";

/// Result of sending a message in a session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub session_id: String,
    /// The stored assistant turn.
    pub message: Message,
    pub usage: Option<Usage>,
    pub model: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedSession {
    pub session: Session,
    /// Assistant reply to the initial message, when one was supplied.
    pub first_message: Option<Message>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Pagination {
    pub limit: usize,
    pub offset: usize,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionHistory {
    pub session: Session,
    pub messages: Vec<Message>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostQuote {
    /// Display name of the model.
    pub model: String,
    pub model_id: String,
    pub cost: CostEstimate,
    pub pricing: ModelPricing,
}

/// Reply to a one-off prompt that is not stored anywhere.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectReply {
    pub response: String,
    pub model_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Reply to a client-held conversation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationReply {
    pub response: String,
    pub model_id: String,
    pub message: String,
    pub usage: Option<Usage>,
    /// The supplied context followed by this exchange.
    pub updated_context: Vec<String>,
}

/// Per-request overrides of the configured sampling parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParamOverrides {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
    pub model: String,
    pub response: String,
    pub usage: Option<Usage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamHealth {
    pub open_router_api: bool,
    pub provider: &'static str,
    pub timestamp: DateTime<Utc>,
}

pub struct ChatOrchestrator {
    sessions: Arc<SessionStore>,
    provider: Arc<dyn ChatProvider>,
    settings: ChatSettings,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn require_prompt<'a>(model_id: &'a str, message: &str) -> Result<&'a str, ChatError> {
    match non_blank(Some(model_id)) {
        Some(model) if !message.trim().is_empty() => Ok(model),
        _ => Err(ChatError::Validation(
            "modelId and message are required".to_string(),
        )),
    }
}

impl ChatOrchestrator {
    pub fn new(
        sessions: Arc<SessionStore>,
        provider: Arc<dyn ChatProvider>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            sessions,
            provider,
            settings,
        }
    }

    pub fn provider(&self) -> &Arc<dyn ChatProvider> {
        &self.provider
    }

    fn params(&self) -> CompletionParams {
        CompletionParams {
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            top_p: self.settings.top_p,
        }
    }

    async fn run_completion(
        &self,
        model: &str,
        conversation: &[ChatMessage],
        params: &CompletionParams,
    ) -> Result<Completion, ChatError> {
        tracing::info!(
            model = %model,
            provider = self.provider.name(),
            context_messages = conversation.len(),
            "Requesting completion"
        );

        let completion = match self.provider.complete(model, conversation, params).await {
            Ok(completion) => completion,
            Err(e) => {
                record_completion(model, "error");
                tracing::error!(model = %model, error = %e, "Completion failed");
                return Err(e.into());
            }
        };
        record_completion(model, "success");
        if let Some(usage) = &completion.usage {
            record_tokens(model, usage);
        }
        Ok(completion)
    }

    /// Send a single user message with the configured parameters. Nothing is
    /// persisted.
    pub async fn direct_message(
        &self,
        model_id: &str,
        message: &str,
    ) -> Result<DirectReply, ChatError> {
        let model = require_prompt(model_id, message)?;
        let conversation = [ChatMessage::new(Role::User, message)];
        let completion = self
            .run_completion(model, &conversation, &self.params())
            .await?;

        Ok(DirectReply {
            response: completion.reply,
            model_id: model.to_string(),
            message: message.to_string(),
            usage: completion.usage,
        })
    }

    /// Continue a conversation the client keeps itself. `context` alternates
    /// user and assistant turns, starting with the user.
    pub async fn conversation(
        &self,
        model_id: &str,
        message: &str,
        context: &[String],
    ) -> Result<ConversationReply, ChatError> {
        let model = require_prompt(model_id, message)?;

        let mut conversation: Vec<ChatMessage> = context
            .iter()
            .enumerate()
            .map(|(i, content)| {
                let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                ChatMessage::new(role, content.as_str())
            })
            .collect();
        conversation.push(ChatMessage::new(Role::User, message));

        let completion = self
            .run_completion(model, &conversation, &self.params())
            .await?;

        let mut updated_context: Vec<String> =
            conversation.into_iter().map(|m| m.content).collect();
        updated_context.push(completion.reply.clone());

        Ok(ConversationReply {
            response: completion.reply,
            model_id: model.to_string(),
            message: message.to_string(),
            usage: completion.usage,
            updated_context,
        })
    }

    /// Single-message completion with caller-supplied sampling parameters.
    pub async fn complete(
        &self,
        model_id: &str,
        message: &str,
        overrides: ParamOverrides,
    ) -> Result<CompletionResult, ChatError> {
        let model = require_prompt(model_id, message)?;
        let defaults = self.params();
        let params = CompletionParams {
            max_tokens: overrides.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: overrides.temperature.unwrap_or(defaults.temperature),
            top_p: overrides.top_p.unwrap_or(defaults.top_p),
        };

        let conversation = [ChatMessage::new(Role::User, message)];
        let completion = self.run_completion(model, &conversation, &params).await?;

        Ok(CompletionResult {
            model: model.to_string(),
            response: completion.reply,
            usage: completion.usage,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
        })
    }

    /// Upstream reachability. A failed check is reported, not returned as an error.
    pub async fn upstream_health(&self) -> UpstreamHealth {
        let healthy = match self.provider.health_check().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    error = %e,
                    "Upstream health check failed"
                );
                false
            }
        };

        UpstreamHealth {
            open_router_api: healthy,
            provider: self.provider.name(),
            timestamp: Utc::now(),
        }
    }

    /// Store the user turn, ask the model and store its reply.
    ///
    /// An upstream failure leaves the user turn in place.
    #[tracing::instrument(skip(self, principal, message), fields(user_id = %principal.id))]
    pub async fn send_session_message(
        &self,
        principal: &Principal,
        session_id: &str,
        message: &str,
        model_id: Option<&str>,
    ) -> Result<ChatReply, ChatError> {
        if session_id.trim().is_empty() || message.trim().is_empty() {
            return Err(ChatError::Validation(
                "sessionId and message are required".to_string(),
            ));
        }

        let session = self
            .sessions
            .get_owned_session(session_id, &principal.id)
            .await?;

        let model = non_blank(model_id)
            .or(session.model.as_deref())
            .unwrap_or(self.settings.default_model.as_str())
            .to_string();

        self.sessions
            .add_message(session_id, NewMessage::user(message).with_model(&model))
            .await?;

        let window = self
            .sessions
            .get_recent_messages(session_id, self.settings.context_window)
            .await?;
        let conversation: Vec<ChatMessage> = window
            .into_iter()
            .map(|m| ChatMessage::new(m.role, m.content))
            .collect();

        let completion = self
            .run_completion(&model, &conversation, &self.params())
            .await?;

        let mut reply = NewMessage::assistant(completion.reply).with_model(&model);
        if let Some(usage) = completion.usage {
            reply = reply.with_tokens(usage.into());
        }
        let stored = self.sessions.add_message(session_id, reply).await?;

        Ok(ChatReply {
            session_id: session_id.to_string(),
            message: stored,
            usage: completion.usage,
            model,
        })
    }

    /// Create a session and optionally run its first exchange.
    pub async fn start_session(
        &self,
        principal: &Principal,
        title: Option<&str>,
        model_id: Option<&str>,
        initial_message: Option<&str>,
    ) -> Result<StartedSession, ChatError> {
        let title = non_blank(title).unwrap_or(DEFAULT_START_TITLE);
        let model = non_blank(model_id).unwrap_or(self.settings.default_model.as_str());

        let session = self
            .sessions
            .create_session(&principal.id, Some(title.to_string()), Some(model.to_string()))
            .await?;

        let Some(initial) = non_blank(initial_message) else {
            return Ok(StartedSession {
                session,
                first_message: None,
            });
        };

        let reply = self
            .send_session_message(principal, &session.id, initial, None)
            .await?;
        let session = self
            .sessions
            .get_session(&session.id)
            .await?
            .unwrap_or(session);

        Ok(StartedSession {
            session,
            first_message: Some(reply.message),
        })
    }

    pub async fn session_history(
        &self,
        principal: &Principal,
        session_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<SessionHistory, ChatError> {
        let session = self
            .sessions
            .get_owned_session(session_id, &principal.id)
            .await?;
        let messages = self
            .sessions
            .get_session_messages(session_id, limit, offset)
            .await?;

        Ok(SessionHistory {
            session,
            pagination: Pagination {
                limit,
                offset,
                count: messages.len(),
            },
            messages,
        })
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, ChatError> {
        Ok(self.provider.list_models().await?)
    }

    pub async fn filtered_models(&self, filter: &ModelFilter) -> Result<Vec<ModelInfo>, ChatError> {
        Ok(filter.apply(self.list_models().await?))
    }

    pub async fn estimate_cost(
        &self,
        model_id: &str,
        prompt_tokens: u64,
        completion_tokens: u64,
    ) -> Result<CostQuote, ChatError> {
        let model = self
            .list_models()
            .await?
            .into_iter()
            .find(|m| m.id == model_id)
            .ok_or_else(|| ChatError::NotFound("Model not found".to_string()))?;

        Ok(CostQuote {
            cost: CostEstimate::for_model(&model, prompt_tokens, completion_tokens),
            model: model.name,
            model_id: model.id,
            pricing: model.pricing,
        })
    }
}
