//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! - **Topic**: Pub/sub channel name derived from a chat id
//! - **PageParams / Page**: History pagination

mod pagination;
mod topic;

pub use pagination::*;
pub use topic::*;
