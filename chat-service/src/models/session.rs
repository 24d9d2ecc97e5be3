//! Chat session model.

use super::{optional, parse_counter, parse_timestamp, required, DecodeError};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const FIELD_ID: &str = "id";
pub const FIELD_USER_ID: &str = "userId";
pub const FIELD_CREATED_AT: &str = "createdAt";
pub const FIELD_LAST_ACTIVITY: &str = "lastActivity";
pub const FIELD_MESSAGE_COUNT: &str = "messageCount";
pub const FIELD_TITLE: &str = "title";
pub const FIELD_MODEL: &str = "model";

/// A bounded, expiring conversation owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Number of messages currently indexed for this session.
    pub message_count: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Session {
    /// Create a fresh session. An absent or blank title defaults to
    /// `Chat Session <timestamp>`.
    pub fn new(user_id: String, title: Option<String>, model: Option<String>) -> Self {
        let now = Utc::now();
        let title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("Chat Session {}", format_timestamp(now)));

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            created_at: now,
            last_activity: now,
            message_count: 0,
            title,
            model: model.filter(|m| !m.trim().is_empty()),
        }
    }

    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            (FIELD_ID, self.id.clone()),
            (FIELD_USER_ID, self.user_id.clone()),
            (FIELD_CREATED_AT, format_timestamp(self.created_at)),
            (FIELD_LAST_ACTIVITY, format_timestamp(self.last_activity)),
            (FIELD_MESSAGE_COUNT, self.message_count.to_string()),
            (FIELD_TITLE, self.title.clone()),
            (FIELD_MODEL, self.model.clone().unwrap_or_default()),
        ]
    }

    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, DecodeError> {
        let message_count: i64 = parse_counter(fields, FIELD_MESSAGE_COUNT)?;

        Ok(Self {
            id: required(fields, FIELD_ID)?.to_string(),
            user_id: required(fields, FIELD_USER_ID)?.to_string(),
            created_at: parse_timestamp(fields, FIELD_CREATED_AT)?,
            last_activity: parse_timestamp(fields, FIELD_LAST_ACTIVITY)?,
            message_count: message_count.max(0),
            title: fields.get(FIELD_TITLE).cloned().unwrap_or_default(),
            model: optional(fields, FIELD_MODEL),
        })
    }
}

/// RFC 3339 with millisecond precision, the format every timestamp field uses.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
