//! # Chat Fan-out Library
//!
//! This crate provides the real-time delivery core of a chat service:
//! - Topic-based publish/subscribe over Redis (or in-process)
//! - One serving session per connection, tracking membership changes live
//! - Two-tier message history: Redis fast tier, PostgreSQL durable tier
//! - HTTP history API and WebSocket gateway
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Messages, topics, pagination, and the bus/store/oracle traits
//! - **Application Layer**: Message service and serving sessions
//! - **Infrastructure Layer**: Bus bindings, history tiers, repositories, metrics
//! - **Presentation Layer**: HTTP handlers and WebSocket gateway
//!
//! ## Module Structure
//!
//! ```text
//! chat_fanout/
//! +-- config/         Configuration management
//! +-- domain/         Domain entities, value objects, and traits
//! +-- application/    Application services and DTOs
//! +-- infrastructure/ Bus, history, database and cache implementations
//! +-- presentation/   HTTP routes and WebSocket handlers
//! +-- shared/         Common utilities (errors, snowflake IDs)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
