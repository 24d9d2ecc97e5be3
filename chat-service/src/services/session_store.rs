//! Session store: CRUD, cap eviction and expiry over sessions and messages.
//!
//! Key layout:
//! - `session:{id}` hash with the session fields
//! - `session:{id}:messages` list of message ids, newest first
//! - `user:{userId}:sessions` list of session ids, newest first
//! - `message:{id}` hash with the message fields
//!
//! Every key shares the session TTL and is refreshed together with it.

use super::error::{ChatError, StoreError};
use super::kv::KvStore;
use super::metrics::{consistency_warning, record_evictions, record_session_created};
use crate::config::SessionConfig;
use crate::models::session::{
    format_timestamp, FIELD_LAST_ACTIVITY, FIELD_MESSAGE_COUNT, FIELD_USER_ID,
};
use crate::models::{Message, NewMessage, Session};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;

fn session_key(session_id: &str) -> String {
    format!("session:{}", session_id)
}

fn messages_key(session_id: &str) -> String {
    format!("session:{}:messages", session_id)
}

fn user_sessions_key(user_id: &str) -> String {
    format!("user:{}:sessions", user_id)
}

fn message_key(message_id: &str) -> String {
    format!("message:{}", message_id)
}

/// Redis list indices covering chronological positions
/// `[offset, offset + limit)` of a newest-first list.
fn chronological_range(limit: usize, offset: usize) -> (isize, isize) {
    let max = isize::MAX as usize - 1;
    let end = offset.saturating_add(limit).min(max) as isize;
    let first = offset.min(max) as isize;
    (-end, -(first + 1))
}

pub struct SessionStore {
    kv: Arc<dyn KvStore>,
    config: SessionConfig,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KvStore>, config: SessionConfig) -> Self {
        Self { kv, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Create a session and evict the user's oldest sessions beyond the cap.
    pub async fn create_session(
        &self,
        user_id: &str,
        title: Option<String>,
        model: Option<String>,
    ) -> Result<Session, ChatError> {
        if user_id.trim().is_empty() {
            return Err(ChatError::Validation("userId is required".to_string()));
        }

        let session = Session::new(user_id.to_string(), title, model);
        let key = session_key(&session.id);
        self.kv.hset_all(&key, &session.to_fields()).await?;
        self.kv.expire(&key, self.config.ttl_seconds).await?;

        let evicted = self
            .kv
            .push_capped(
                &user_sessions_key(user_id),
                &session.id,
                self.config.max_sessions_per_user,
                self.config.ttl_seconds,
            )
            .await?;

        if !evicted.is_empty() {
            tracing::info!(
                user_id = %user_id,
                evicted = evicted.len(),
                "Evicting sessions over the per-user cap"
            );
            record_evictions("session", evicted.len());
        }
        for old_id in &evicted {
            if let Err(e) = self.delete_session(old_id).await {
                consistency_warning("evict_session", &session_key(old_id), &e);
            }
        }

        record_session_created();
        tracing::info!(session_id = %session.id, user_id = %user_id, "Session created");
        Ok(session)
    }

    /// `None` when the session never existed, expired, or cannot be decoded.
    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>, ChatError> {
        let key = session_key(session_id);
        let fields = self.kv.hgetall(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }

        match Session::from_fields(&fields) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                let err = StoreError::Corrupt {
                    key: key.clone(),
                    source: e,
                };
                consistency_warning("get_session", &key, &err);
                Ok(None)
            }
        }
    }

    /// The session if it exists and belongs to `user_id`. Another user's
    /// session is reported as not found.
    pub async fn get_owned_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<Session, ChatError> {
        match self.get_session(session_id).await? {
            Some(session) if session.user_id == user_id => Ok(session),
            Some(_) => {
                tracing::warn!(session_id = %session_id, "Session accessed by non-owner");
                Err(ChatError::session_not_found())
            }
            None => Err(ChatError::session_not_found()),
        }
    }

    /// Stamp `lastActivity` and refresh the expiry of the session and its indexes.
    pub async fn update_session_activity(&self, session_id: &str) -> Result<(), ChatError> {
        let key = session_key(session_id);
        if !self.kv.exists(&key).await? {
            return Err(ChatError::session_not_found());
        }
        self.kv
            .hset(&key, FIELD_LAST_ACTIVITY, &format_timestamp(Utc::now()))
            .await?;
        self.refresh_ttl(session_id).await?;
        Ok(())
    }

    /// Append a message, keeping at most `max_messages_per_session`.
    pub async fn add_message(
        &self,
        session_id: &str,
        new_message: NewMessage,
    ) -> Result<Message, ChatError> {
        let key = session_key(session_id);
        if !self.kv.exists(&key).await? {
            return Err(ChatError::session_not_found());
        }

        let message = Message::new(session_id, new_message);
        let record_key = message_key(&message.id);
        self.kv.hset_all(&record_key, &message.to_fields()).await?;
        self.kv.expire(&record_key, self.config.ttl_seconds).await?;

        let evicted = self
            .kv
            .push_capped(
                &messages_key(session_id),
                &message.id,
                self.config.max_messages_per_session,
                self.config.ttl_seconds,
            )
            .await?;

        self.kv.hincr_by(&key, FIELD_MESSAGE_COUNT, 1).await?;
        self.update_session_activity(session_id).await?;

        if !evicted.is_empty() {
            self.evict_messages(session_id, &evicted).await;
        }

        tracing::debug!(
            session_id = %session_id,
            message_id = %message.id,
            role = %message.role,
            "Message appended"
        );
        Ok(message)
    }

    /// Drop evicted message records and keep `messageCount` equal to the index length.
    async fn evict_messages(&self, session_id: &str, evicted: &[String]) {
        record_evictions("message", evicted.len());

        for message_id in evicted {
            let key = message_key(message_id);
            if let Err(e) = self.kv.del(&key).await {
                consistency_warning("evict_message", &key, &e);
            }
        }

        let key = session_key(session_id);
        if let Err(e) = self
            .kv
            .hincr_by(&key, FIELD_MESSAGE_COUNT, -(evicted.len() as i64))
            .await
        {
            consistency_warning("evict_message_count", &key, &e);
        }
    }

    /// A page of messages in chronological order. `offset` counts from the
    /// oldest indexed message; records that expired on their own are skipped.
    pub async fn get_session_messages(
        &self,
        session_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>, ChatError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let (start, stop) = chronological_range(limit, offset);
        let mut ids = self.kv.lrange(&messages_key(session_id), start, stop).await?;
        ids.reverse();
        self.load_messages(ids).await
    }

    /// The `count` most recent messages in chronological order.
    pub async fn get_recent_messages(
        &self,
        session_id: &str,
        count: usize,
    ) -> Result<Vec<Message>, ChatError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let stop = count.min(isize::MAX as usize) as isize - 1;
        let mut ids = self.kv.lrange(&messages_key(session_id), 0, stop).await?;
        ids.reverse();
        self.load_messages(ids).await
    }

    async fn load_messages(&self, ids: Vec<String>) -> Result<Vec<Message>, ChatError> {
        let keys: Vec<String> = ids.iter().map(|id| message_key(id)).collect();
        let records = join_all(keys.iter().map(|key| self.kv.hgetall(key))).await;

        let mut messages = Vec::with_capacity(records.len());
        for (key, record) in keys.iter().zip(records) {
            let fields = record?;
            if fields.is_empty() {
                continue;
            }
            match Message::from_fields(&fields) {
                Ok(message) => messages.push(message),
                Err(e) => consistency_warning(
                    "load_message",
                    key,
                    &StoreError::Corrupt {
                        key: key.clone(),
                        source: e,
                    },
                ),
            }
        }
        Ok(messages)
    }

    /// The user's live sessions, most recently active first.
    pub async fn get_user_sessions(&self, user_id: &str) -> Result<Vec<Session>, ChatError> {
        let ids = self.kv.lrange(&user_sessions_key(user_id), 0, -1).await?;
        let lookups = join_all(ids.iter().map(|id| self.get_session(id))).await;

        let mut sessions = Vec::with_capacity(lookups.len());
        for lookup in lookups {
            if let Some(session) = lookup? {
                sessions.push(session);
            }
        }
        sessions.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(sessions)
    }

    /// Delete a session, its messages and its index entries.
    /// Returns false when the session did not exist.
    pub async fn delete_session(&self, session_id: &str) -> Result<bool, ChatError> {
        let key = session_key(session_id);
        let fields = self.kv.hgetall(&key).await?;
        if fields.is_empty() {
            return Ok(false);
        }

        let list_key = messages_key(session_id);
        let message_ids = self.kv.lrange(&list_key, 0, -1).await?;
        for message_id in &message_ids {
            self.kv.del(&message_key(message_id)).await?;
        }
        self.kv.del(&list_key).await?;
        self.kv.del(&key).await?;

        if let Some(user_id) = fields.get(FIELD_USER_ID) {
            self.kv
                .lrem(&user_sessions_key(user_id), 1, session_id)
                .await?;
        }

        tracing::info!(
            session_id = %session_id,
            messages = message_ids.len(),
            "Session deleted"
        );
        Ok(true)
    }

    pub async fn is_valid_session(&self, session_id: &str) -> Result<bool, ChatError> {
        Ok(self.kv.exists(&session_key(session_id)).await?)
    }

    /// Refresh the expiry of the session and its indexes without touching any
    /// field. Returns false when the session does not exist.
    pub async fn extend_session(&self, session_id: &str) -> Result<bool, ChatError> {
        self.refresh_ttl(session_id).await
    }

    async fn refresh_ttl(&self, session_id: &str) -> Result<bool, ChatError> {
        let ttl = self.config.ttl_seconds;
        let key = session_key(session_id);
        if !self.kv.expire(&key, ttl).await? {
            return Ok(false);
        }
        // No messages yet means no list to refresh.
        let list_key = messages_key(session_id);
        self.kv.expire(&list_key, ttl).await?;
        self.refresh_message_records(&list_key, ttl).await?;

        let fields = self.kv.hgetall(&key).await?;
        if let Some(user_id) = fields.get(FIELD_USER_ID) {
            self.kv.expire(&user_sessions_key(user_id), ttl).await?;
        }
        Ok(true)
    }

    /// Re-expire every indexed `message:{id}` record. A record that fails to
    /// refresh is reported and left with its previous expiry.
    async fn refresh_message_records(&self, list_key: &str, ttl: u64) -> Result<(), ChatError> {
        let ids = self.kv.lrange(list_key, 0, -1).await?;
        let keys: Vec<String> = ids.iter().map(|id| message_key(id)).collect();
        let results = join_all(keys.iter().map(|key| self.kv.expire(key, ttl))).await;

        for (key, result) in keys.iter().zip(results) {
            if let Err(e) = result {
                consistency_warning("refresh_message_ttl", key, &e);
            }
        }
        Ok(())
    }
}
