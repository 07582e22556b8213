//! Server assembly for the Conduit gateway
//!
//! Wires configuration into the orchestrator and its stores, builds the
//! axum router, and serves it with graceful shutdown.

mod health;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use conduit_cache::{CacheStore, MemoryCacheStore, ValkeyCacheStore};
use conduit_config::Config;
use conduit_conversation::{ConversationStore, Correlator, MemoryConversationStore, ValkeyConversationStore};
use conduit_llm::fallback::FallbackEngine;
use conduit_llm::health::ProviderHealthTracker;
use conduit_llm::resolve::ModelResolver;
use conduit_llm::router::GatewayState;
use conduit_llm::{Orchestrator, ProviderRegistry};
use tower_http::trace::TraceLayer;

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if provider construction or a store URL is invalid
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let listen_address = config
            .server
            .listen_address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let registry = ProviderRegistry::from_config(&config.llm)?;
        let resolver = ModelResolver::new(&config.llm, &config.fallback.catalog);
        let health_tracker = ProviderHealthTracker::new(config.fallback.circuit_breaker.clone());
        let fallback = FallbackEngine::new(&config.fallback);

        let cache = build_cache_store(&config)?;
        let correlator = build_correlator(&config)?;

        let orchestrator = Arc::new(Orchestrator::new(
            registry,
            resolver,
            health_tracker,
            fallback,
            cache,
            correlator,
        ));

        let mut app = Router::new();

        if config.server.health.enabled {
            app = app.route(&config.server.health.path, axum::routing::get(health::health_handler));
        }

        app = app.merge(conduit_llm::llm_router(GatewayState::new(orchestrator)));
        app = app.layer(TraceLayer::new_for_http());

        Ok(Self {
            router: app,
            listen_address,
        })
    }

    /// Get the configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}

/// Build the response cache store, if enabled
fn build_cache_store(config: &Config) -> anyhow::Result<Option<Arc<dyn CacheStore>>> {
    let Some(cache_config) = &config.cache else {
        return Ok(None);
    };
    if !cache_config.enabled {
        return Ok(None);
    }

    let ttl = Duration::from_secs(cache_config.ttl_seconds);
    let store: Arc<dyn CacheStore> = match &cache_config.url {
        Some(url) => Arc::new(ValkeyCacheStore::new(
            url.as_str(),
            ttl,
            cache_config.key_prefix.clone(),
        )?),
        None => Arc::new(MemoryCacheStore::with_ttl(ttl)),
    };

    Ok(Some(store))
}

/// Build the conversation correlator, if enabled
fn build_correlator(config: &Config) -> anyhow::Result<Option<Correlator>> {
    let Some(conversation_config) = &config.conversation else {
        return Ok(None);
    };
    if !conversation_config.enabled {
        return Ok(None);
    }

    let store: Arc<dyn ConversationStore> = match &conversation_config.url {
        Some(url) => Arc::new(ValkeyConversationStore::new(
            url.as_str(),
            conversation_config.key_prefix.clone(),
        )?),
        None => Arc::new(MemoryConversationStore::new()),
    };

    Ok(Some(Correlator::new(
        store,
        Duration::from_secs(conversation_config.ttl_seconds),
    )))
}
