//! Application startup and lifecycle management.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use service_core::error::AppError;
use tokio::net::TcpListener;

use crate::config::{ChatConfig, StoreBackend};
use crate::services::{
    metrics, ChatProvider, KvStore, MemoryStore, MockChatProvider, OpenRouterProvider, RedisStore,
};
use crate::{build_router, AppState};

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
    redis: Option<Arc<RedisStore>>,
}

impl Application {
    /// Connect the store, pick the upstream provider and bind the listener.
    pub async fn build(config: ChatConfig) -> Result<Self, AppError> {
        metrics::init_metrics()?;

        let (store, redis) = connect_store(&config).await?;
        let provider = select_provider(&config)?;
        let state = AppState::new(config.clone(), store, provider);

        // Port 0 binds a random port for tests.
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            service = %config.service_name,
            environment = ?config.environment,
            port,
            "Chat service listening"
        );

        Ok(Self {
            port,
            listener,
            state,
            redis,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until `shutdown` resolves, then close the store connection.
    pub async fn run_until_stopped<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = build_router(self.state);

        let result = axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await;

        if let Some(redis) = &self.redis {
            redis.disconnect();
        }
        if let Err(e) = &result {
            tracing::error!("HTTP server error: {}", e);
        }
        result
    }
}

async fn connect_store(
    config: &ChatConfig,
) -> Result<(Arc<dyn KvStore>, Option<Arc<RedisStore>>), AppError> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; sessions are lost on restart");
            Ok((Arc::new(MemoryStore::new()), None))
        }
        StoreBackend::Redis => {
            use secrecy::ExposeSecret;

            let redis = RedisStore::new(config.store.redis_url.expose_secret())
                .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;
            redis.connect().await.map_err(|e| {
                tracing::error!("Failed to connect to Redis: {}", e);
                AppError::ServiceUnavailable(e.to_string())
            })?;

            let redis = Arc::new(redis);
            Ok((redis.clone(), Some(redis)))
        }
    }
}

fn select_provider(config: &ChatConfig) -> Result<Arc<dyn ChatProvider>, AppError> {
    if config.openrouter.api_key.is_none() {
        tracing::warn!("OPENROUTER_API_KEY not set; replies come from the mock provider");
        return Ok(Arc::new(MockChatProvider::default()));
    }

    let provider = OpenRouterProvider::new(&config.openrouter)
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;
    tracing::info!(
        base_url = %config.openrouter.base_url,
        default_model = %config.chat.default_model,
        "Initialized OpenRouter provider"
    );
    Ok(Arc::new(provider))
}
