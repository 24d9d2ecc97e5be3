use secrecy::Secret;
use serde::Deserialize;
use service_core::config::{self as core_config, get_env, get_env_opt, get_env_parsed, Environment};
use service_core::error::AppError;

/// Placeholder shipped in sample `.env` files; treated the same as no key.
const PLACEHOLDER_API_KEY: &str = "your_openrouter_api_key_here";

/// Development-only signing secret, rejected in production by `get_env`.
const DEV_JWT_SECRET: &str = "dev-secret-change-in-production";

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub store: StoreConfig,
    pub session: SessionConfig,
    pub chat: ChatSettings,
    pub openrouter: OpenRouterConfig,
    pub jwt: JwtConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub redis_url: Secret<String>,
}

/// Lifetime and size bounds for sessions.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Expiry horizon for session, message and index keys.
    pub ttl_seconds: u64,
    pub max_sessions_per_user: usize,
    pub max_messages_per_session: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 3600,
            max_sessions_per_user: 5,
            max_messages_per_session: 100,
        }
    }
}

/// Parameters the orchestrator passes to the upstream model.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatSettings {
    /// Number of most recent messages sent as context.
    pub context_window: usize,
    pub default_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            context_window: 20,
            default_model: "openai/gpt-3.5-turbo".to_string(),
            max_tokens: 1000,
            temperature: 0.7,
            top_p: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenRouterConfig {
    /// `None` selects the mock provider.
    pub api_key: Option<Secret<String>>,
    pub base_url: String,
    pub timeout_seconds: u64,
    pub referer: String,
    pub app_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: Secret<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub chat_requests_per_minute: u32,
}

impl ChatConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let environment = Environment::from_env()?;
        let is_prod = environment.is_prod();

        let backend = match get_env("STORE_BACKEND", Some("redis"), false)?
            .to_lowercase()
            .as_str()
        {
            "redis" => StoreBackend::Redis,
            "memory" => StoreBackend::Memory,
            other => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "STORE_BACKEND must be 'redis' or 'memory', got '{}'",
                    other
                )))
            }
        };

        let api_key = get_env_opt("OPENROUTER_API_KEY")
            .filter(|key| key != PLACEHOLDER_API_KEY)
            .map(Secret::new);

        Ok(ChatConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("chat-service"), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: get_env_opt("OTLP_ENDPOINT"),
            store: StoreConfig {
                backend,
                redis_url: Secret::new(redis_url(is_prod)?),
            },
            session: SessionConfig {
                ttl_seconds: get_env_parsed("SESSION_TTL", "3600", false)?,
                max_sessions_per_user: positive_cap(
                    "MAX_SESSIONS_PER_USER",
                    get_env_parsed("MAX_SESSIONS_PER_USER", "5", false)?,
                )?,
                max_messages_per_session: positive_cap(
                    "MAX_MESSAGES_PER_SESSION",
                    get_env_parsed("MAX_MESSAGES_PER_SESSION", "100", false)?,
                )?,
            },
            chat: ChatSettings {
                context_window: get_env_parsed("CHAT_CONTEXT_WINDOW", "20", false)?,
                default_model: get_env("DEFAULT_MODEL", Some("openai/gpt-3.5-turbo"), false)?,
                max_tokens: get_env_parsed("CHAT_MAX_TOKENS", "1000", false)?,
                temperature: get_env_parsed("CHAT_TEMPERATURE", "0.7", false)?,
                top_p: get_env_parsed("CHAT_TOP_P", "1.0", false)?,
            },
            openrouter: OpenRouterConfig {
                api_key,
                base_url: get_env(
                    "OPENROUTER_BASE_URL",
                    Some("https://openrouter.ai/api/v1"),
                    false,
                )?,
                timeout_seconds: get_env_parsed("OPENROUTER_TIMEOUT_SECONDS", "60", false)?,
                referer: get_env("HTTP_REFERER", Some("http://localhost:3000"), false)?,
                app_name: get_env("APP_NAME", Some("Chat Backend"), false)?,
            },
            jwt: JwtConfig {
                secret: Secret::new(get_env("JWT_SECRET", Some(DEV_JWT_SECRET), is_prod)?),
            },
            security: SecurityConfig {
                allowed_origins: get_env("ALLOWED_ORIGINS", Some("http://localhost:3000"), false)?
                    .split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect(),
                chat_requests_per_minute: get_env_parsed("CHAT_RATE_LIMIT_PER_MINUTE", "60", false)?,
            },
        })
    }
}

fn positive_cap(name: &str, value: usize) -> Result<usize, AppError> {
    if value == 0 {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "{} must be at least 1",
            name
        )));
    }
    Ok(value)
}

/// `REDIS_URL` wins; otherwise the URL is assembled from the discrete
/// `REDIS_HOST`/`REDIS_PORT`/`REDIS_PASSWORD`/`REDIS_DB` variables.
fn redis_url(is_prod: bool) -> Result<String, AppError> {
    if let Some(url) = get_env_opt("REDIS_URL") {
        return Ok(url);
    }

    let host = get_env("REDIS_HOST", Some("localhost"), is_prod)?;
    let port = get_env("REDIS_PORT", Some("6379"), false)?;
    let db = get_env("REDIS_DB", Some("0"), false)?;
    Ok(match get_env_opt("REDIS_PASSWORD") {
        Some(password) => format!("redis://:{}@{}:{}/{}", password, host, port, db),
        None => format!("redis://{}:{}/{}", host, port, db),
    })
}
