//! Chat message model.

use super::session::format_timestamp;
use super::{optional, parse_counter, parse_timestamp, required, DecodeError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

const FIELD_ID: &str = "id";
const FIELD_SESSION_ID: &str = "sessionId";
const FIELD_ROLE: &str = "role";
const FIELD_CONTENT: &str = "content";
const FIELD_TIMESTAMP: &str = "timestamp";
const FIELD_MODEL: &str = "model";
const FIELD_PROMPT_TOKENS: &str = "promptTokens";
const FIELD_COMPLETION_TOKENS: &str = "completionTokens";
const FIELD_TOTAL_TOKENS: &str = "totalTokens";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(format!(
                "Invalid role '{}'. Must be user, assistant, or system",
                other
            )),
        }
    }
}

/// Token accounting for one turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt: u32,
    #[serde(default)]
    pub completion: u32,
    #[serde(default)]
    pub total: u32,
}

impl TokenUsage {
    pub fn new(prompt: u32, completion: u32, total: u32) -> Self {
        Self {
            prompt,
            completion,
            total,
        }
    }
}

/// One turn inside a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub tokens: TokenUsage,
}

/// Caller-supplied part of a message; id, session and timestamp are
/// assigned on append.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    pub model: Option<String>,
    pub tokens: Option<TokenUsage>,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            model: None,
            tokens: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            model: None,
            tokens: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_tokens(mut self, tokens: TokenUsage) -> Self {
        self.tokens = Some(tokens);
        self
    }
}

impl Message {
    pub fn new(session_id: &str, new: NewMessage) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            role: new.role,
            content: new.content,
            timestamp: Utc::now(),
            model: new.model.filter(|m| !m.is_empty()),
            tokens: new.tokens.unwrap_or_default(),
        }
    }

    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            (FIELD_ID, self.id.clone()),
            (FIELD_SESSION_ID, self.session_id.clone()),
            (FIELD_ROLE, self.role.to_string()),
            (FIELD_CONTENT, self.content.clone()),
            (FIELD_TIMESTAMP, format_timestamp(self.timestamp)),
            (FIELD_MODEL, self.model.clone().unwrap_or_default()),
            (FIELD_PROMPT_TOKENS, self.tokens.prompt.to_string()),
            (FIELD_COMPLETION_TOKENS, self.tokens.completion.to_string()),
            (FIELD_TOTAL_TOKENS, self.tokens.total.to_string()),
        ]
    }

    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, DecodeError> {
        let raw_role = required(fields, FIELD_ROLE)?;
        let role = raw_role.parse().map_err(|_| DecodeError::InvalidField {
            field: FIELD_ROLE,
            value: raw_role.to_string(),
        })?;

        Ok(Self {
            id: required(fields, FIELD_ID)?.to_string(),
            session_id: required(fields, FIELD_SESSION_ID)?.to_string(),
            role,
            content: fields.get(FIELD_CONTENT).cloned().unwrap_or_default(),
            timestamp: parse_timestamp(fields, FIELD_TIMESTAMP)?,
            model: optional(fields, FIELD_MODEL),
            tokens: TokenUsage {
                prompt: parse_counter(fields, FIELD_PROMPT_TOKENS)?,
                completion: parse_counter(fields, FIELD_COMPLETION_TOKENS)?,
                total: parse_counter(fields, FIELD_TOTAL_TOKENS)?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_map(fields: Vec<(&'static str, String)>) -> HashMap<String, String> {
        fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn role_parses_only_known_values() {
        assert_eq!("assistant".parse::<Role>(), Ok(Role::Assistant));
        assert!("moderator".parse::<Role>().is_err());
        assert!("User".parse::<Role>().is_err());
    }

    #[test]
    fn absent_tokens_default_to_zero() {
        let message = Message::new("s1", NewMessage::user("hi"));
        assert_eq!(message.tokens, TokenUsage::default());

        let decoded = Message::from_fields(&as_map(message.to_fields())).unwrap();
        assert_eq!(decoded.tokens, TokenUsage::new(0, 0, 0));
        assert_eq!(decoded.model, None);
    }

    #[test]
    fn token_fields_survive_storage() {
        let message = Message::new(
            "s1",
            NewMessage::assistant("hello")
                .with_model("openai/gpt-4")
                .with_tokens(TokenUsage::new(10, 5, 15)),
        );
        let decoded = Message::from_fields(&as_map(message.to_fields())).unwrap();
        assert_eq!(decoded.tokens, TokenUsage::new(10, 5, 15));
        assert_eq!(decoded.role, Role::Assistant);
        assert_eq!(decoded.model.as_deref(), Some("openai/gpt-4"));
    }

    #[test]
    fn unknown_stored_role_is_rejected() {
        let mut fields = as_map(Message::new("s1", NewMessage::user("hi")).to_fields());
        fields.insert("role".to_string(), "robot".to_string());
        assert!(matches!(
            Message::from_fields(&fields),
            Err(DecodeError::InvalidField { field: "role", .. })
        ));
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let message = Message::new("s1", NewMessage::user("hi"));
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["role"], "user");
        assert_eq!(json["tokens"]["total"], 0);
    }
}
