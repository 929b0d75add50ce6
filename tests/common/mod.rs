//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure. Everything runs over
//! the in-process bus and history store; no Postgres or Redis is needed.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response, Router};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tower::ServiceExt;

use chat_fanout::application::services::{MessageService, MessageServiceImpl};
use chat_fanout::config::*;
use chat_fanout::domain::{HistoryStore, MembershipOracle, Message, MessageBus};
use chat_fanout::infrastructure::bus::InMemoryMessageBus;
use chat_fanout::infrastructure::history::MemoryHistoryStore;
use chat_fanout::presentation::middleware::Claims;
use chat_fanout::shared::error::AppError;
use chat_fanout::shared::snowflake::{SnowflakeGenerator, DEFAULT_EPOCH};
use chat_fanout::startup::{build_router, AppState};

pub const JWT_SECRET: &str = "integration-test-secret-0123456789";

/// Upper bound on waiting for a delivery that should arrive
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to watch for a delivery that should not arrive
pub const SILENCE_WINDOW: Duration = Duration::from_millis(150);

/// Settings for in-process backends
pub fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        database: DatabaseSettings {
            url: "postgres://localhost/chat_test".into(),
            max_connections: 1,
            min_connections: 0,
            acquire_timeout: 1,
            run_migrations: false,
        },
        redis: RedisSettings {
            url: "redis://127.0.0.1:6379".into(),
        },
        jwt: JwtSettings {
            secret: JWT_SECRET.into(),
        },
        snowflake: SnowflakeSettings {
            machine_id: 1,
            epoch: DEFAULT_EPOCH,
        },
        cors: CorsSettings {
            allowed_origins: vec![],
        },
        websocket: WebSocketSettings {
            max_message_size: 65536,
            max_frame_size: 16384,
        },
        history: HistorySettings {
            fast_tier: FastTierBackend::Memory,
            write_policy: WritePolicy::FastOnly,
            cache_ttl_secs: 3600,
            cache_max_entries: 1000,
            default_page_limit: 50,
            max_page_limit: 100,
        },
        bus: BusSettings {
            backend: BusBackend::Memory,
            session_buffer: 16,
        },
        membership: MembershipSettings { cache_ttl_secs: 60 },
        telemetry: TelemetrySettings { json: false },
        environment: "test".into(),
    }
}

/// Membership oracle backed by a set of `(user_id, chat_id)` pairs
#[derive(Debug, Default)]
pub struct StaticMembership {
    members: RwLock<HashSet<(i64, i64)>>,
}

impl StaticMembership {
    pub fn join(&self, user_id: i64, chat_id: i64) {
        self.members.write().insert((user_id, chat_id));
    }

    pub fn leave(&self, user_id: i64, chat_id: i64) {
        self.members.write().remove(&(user_id, chat_id));
    }
}

#[async_trait]
impl MembershipOracle for StaticMembership {
    async fn is_active_member(&self, user_id: i64, chat_id: i64) -> Result<bool, AppError> {
        Ok(self.members.read().contains(&(user_id, chat_id)))
    }

    async fn active_chats_of(&self, user_id: i64) -> Result<HashSet<i64>, AppError> {
        Ok(self
            .members
            .read()
            .iter()
            .filter(|(user, _)| *user == user_id)
            .map(|(_, chat)| *chat)
            .collect())
    }
}

/// Message service wired over in-process backends
pub struct Harness {
    pub bus: Arc<InMemoryMessageBus>,
    pub history: Arc<MemoryHistoryStore>,
    pub members: Arc<StaticMembership>,
    pub service: Arc<MessageServiceImpl>,
}

impl Harness {
    pub fn new() -> Self {
        let bus = Arc::new(InMemoryMessageBus::new());
        let history = Arc::new(MemoryHistoryStore::new(Duration::from_secs(3600), 1000));
        let members = Arc::new(StaticMembership::default());
        let snowflake = Arc::new(SnowflakeGenerator::new(1, DEFAULT_EPOCH));

        let service = MessageServiceImpl::new(
            Arc::clone(&bus) as Arc<dyn MessageBus>,
            Arc::clone(&history) as Arc<dyn HistoryStore>,
            Arc::clone(&members) as Arc<dyn MembershipOracle>,
            snowflake,
        )
        .with_session_buffer(16);

        Self {
            bus,
            history,
            members,
            service: Arc::new(service),
        }
    }
}

/// Test application builder
pub struct TestApp {
    pub router: Router,
    pub harness: Harness,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_state(|state| state)
    }

    /// Build with extra state, e.g. a database pool for readiness probes
    pub fn with_state(configure: impl FnOnce(AppState) -> AppState) -> Self {
        let harness = Harness::new();
        let state = AppState::new(
            test_settings(),
            Arc::clone(&harness.service) as Arc<dyn MessageService>,
        );
        Self {
            router: build_router(configure(state)),
            harness,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Make a GET request to the application
    pub async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Make an authenticated GET request
    pub async fn get_auth(&self, uri: &str, token: &str) -> Response {
        self.send(
            Request::builder()
                .uri(uri)
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Make a POST request with JSON body
    pub async fn post_json(&self, uri: &str, body: &str) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Make an authenticated POST request with JSON body
    pub async fn post_json_auth(&self, uri: &str, body: &str, token: &str) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

/// Sign a token for `user_id` with the test secret
pub fn token_for(user_id: i64) -> String {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + chrono::Duration::hours(1)).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

/// Read a response body as JSON
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Wait for the next outbound message or fail
pub async fn next_message(outbound: &mut mpsc::Receiver<Message>) -> Message {
    tokio::time::timeout(DELIVERY_TIMEOUT, outbound.recv())
        .await
        .expect("timed out waiting for a delivery")
        .expect("session ended before delivering")
}

/// Assert nothing is delivered within the silence window
pub async fn assert_silent(outbound: &mut mpsc::Receiver<Message>) {
    if let Ok(Some(message)) = tokio::time::timeout(SILENCE_WINDOW, outbound.recv()).await {
        panic!("unexpected delivery: {:?}", message);
    }
}
