//! Services layer for chat-service.
//!
//! Storage adapter, session store, upstream model client and the chat
//! orchestrator that ties them together.

pub mod chat;
pub mod error;
mod jwt;
pub mod kv;
pub mod metrics;
pub mod providers;
pub mod session_store;

pub use chat::{
    ChatOrchestrator, ChatReply, CompletionResult, ConversationReply, CostQuote, DirectReply,
    ParamOverrides, SessionHistory, StartedSession, UpstreamHealth,
};
pub use error::{ChatError, StoreError};
pub use jwt::{JwtService, TokenClaims};
pub use kv::{KvStore, MemoryStore, RedisStore};
pub use providers::{ChatProvider, MockChatProvider, OpenRouterProvider, ProviderError};
pub use session_store::SessionStore;
