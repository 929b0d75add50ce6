//! Repository Implementations
//!
//! PostgreSQL implementations of domain traits.
//!
//! ## Available Repositories
//!
//! - **PgMessageRepository** - Durable message history
//! - **PgMembershipRepository** - Read-only chat membership lookups
//! - **CachedMembershipOracle** - Membership answers cached in Redis
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use chat_fanout::infrastructure::cache::RedisCache;
//! use chat_fanout::infrastructure::repositories::{
//!     CachedMembershipOracle, PgMembershipRepository, PgMessageRepository,
//! };
//!
//! let durable = PgMessageRepository::new(pool.clone());
//! let oracle = CachedMembershipOracle::new(
//!     PgMembershipRepository::new(pool),
//!     RedisCache::new(redis_conn),
//!     60,
//! );
//! ```

mod cached_membership;
mod membership_repository;
mod message_repository;

pub use cached_membership::CachedMembershipOracle;
pub use membership_repository::PgMembershipRepository;
pub use message_repository::PgMessageRepository;
