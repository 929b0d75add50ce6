//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Message bus bindings (Redis pub/sub, in-process)
//! - History tiers (Redis, in-process, PostgreSQL)
//! - Membership lookups (PostgreSQL behind a Redis cache)
//! - Prometheus metrics

pub mod bus;
pub mod cache;
pub mod database;
pub mod history;
pub mod metrics;
pub mod repositories;
