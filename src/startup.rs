//! Application Startup
//!
//! Wires bus, history tiers and membership oracle from settings, then
//! builds the router and binds the listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

use crate::application::services::{MessageService, MessageServiceImpl};
use crate::config::{BusBackend, FastTierBackend, Settings};
use crate::domain::{HistoryStore, MembershipOracle, MessageBus};
use crate::infrastructure::bus::{InMemoryMessageBus, RedisMessageBus};
use crate::infrastructure::cache::{self, RedisCache};
use crate::infrastructure::database;
use crate::infrastructure::history::{MemoryHistoryStore, RedisHistoryStore, TieredHistoryStore};
use crate::infrastructure::repositories::{
    CachedMembershipOracle, PgMembershipRepository, PgMessageRepository,
};
use crate::presentation::http::{handlers, routes};
use crate::presentation::middleware::{cors, logging};
use crate::shared::snowflake::SnowflakeGenerator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub messages: Arc<dyn MessageService>,
    /// Probed by readiness when present
    pub db: Option<PgPool>,
    /// Probed by readiness when present
    pub redis: Option<ConnectionManager>,
}

impl AppState {
    pub fn new(settings: Settings, messages: Arc<dyn MessageService>) -> Self {
        Self {
            settings: Arc::new(settings),
            messages,
            db: None,
            redis: None,
        }
    }

    pub fn with_db(mut self, db: PgPool) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_redis(mut self, redis: ConnectionManager) -> Self {
        self.redis = Some(redis);
        self
    }
}

/// Router with tracing, compression and CORS layers applied
pub fn build_router(state: AppState) -> Router {
    let cors = cors::create_cors_layer(&state.settings.cors);
    routes::create_router(state)
        .layer(CompressionLayer::new())
        .layer(logging::create_trace_layer())
        .layer(cors)
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        handlers::health::init_server_start();

        let db = database::create_pool(&settings.database)
            .await
            .context("Failed to connect to PostgreSQL")?;
        tracing::info!("Database connection pool created");

        if settings.database.run_migrations {
            database::run_migrations(&db)
                .await
                .context("Failed to run migrations")?;
            tracing::info!("Database migrations applied");
        }

        let needs_redis = settings.bus.backend == BusBackend::Redis
            || settings.history.fast_tier == FastTierBackend::Redis;
        let (redis_client, redis) = if needs_redis {
            let client = cache::open_redis_client(&settings.redis)?;
            let manager = cache::create_connection_manager(&client)
                .await
                .context("Failed to connect to Redis")?;
            (Some(client), Some(manager))
        } else {
            (None, None)
        };

        let bus: Arc<dyn MessageBus> = match (settings.bus.backend, &redis_client, &redis) {
            (BusBackend::Redis, Some(client), Some(manager)) => {
                Arc::new(RedisMessageBus::new(client.clone(), manager.clone()))
            }
            _ => Arc::new(InMemoryMessageBus::new()),
        };
        tracing::info!(backend = ?settings.bus.backend, "Message bus ready");

        let fast: Arc<dyn HistoryStore> = match (settings.history.fast_tier, &redis) {
            (FastTierBackend::Redis, Some(manager)) => Arc::new(RedisHistoryStore::new(
                manager.clone(),
                settings.history.cache_ttl_secs,
                settings.history.cache_max_entries,
            )),
            _ => Arc::new(MemoryHistoryStore::new(
                Duration::from_secs(settings.history.cache_ttl_secs),
                settings.history.cache_max_entries,
            )),
        };
        let history: Arc<dyn HistoryStore> = Arc::new(TieredHistoryStore::new(
            fast,
            Arc::new(PgMessageRepository::new(db.clone())),
            settings.history.write_policy,
        ));
        tracing::info!(
            fast_tier = ?settings.history.fast_tier,
            write_policy = ?settings.history.write_policy,
            "History store ready"
        );

        let members = PgMembershipRepository::new(db.clone());
        let oracle: Arc<dyn MembershipOracle> = match &redis {
            Some(manager) => Arc::new(CachedMembershipOracle::new(
                members,
                RedisCache::new(manager.clone()),
                settings.membership.cache_ttl_secs,
            )),
            None => Arc::new(members),
        };

        let snowflake = Arc::new(SnowflakeGenerator::new(
            u64::from(settings.snowflake.machine_id),
            settings.snowflake.epoch,
        ));

        let messages = MessageServiceImpl::new(bus, history, oracle, snowflake)
            .with_session_buffer(settings.bus.session_buffer)
            .with_max_page_limit(settings.history.max_page_limit);

        let addr = settings.server_addr();
        let mut state = AppState::new(settings, Arc::new(messages)).with_db(db);
        if let Some(manager) = redis {
            state = state.with_redis(manager);
        }

        let router = build_router(state);

        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        tracing::info!("Listening on {}", addr);

        Ok(Self { listener, router })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
