//! # Domain Entities
//!
//! - **Message**: An immutable chat message or lifecycle notification
//! - **ChatMembership**: A user's status in a chat
//!
//! ## Store Traits
//!
//! Each entity has an associated trait defining data access. Implementations
//! live in the infrastructure layer, following the dependency inversion
//! principle.

mod membership;
mod message;

pub use membership::{ChatMembership, MembershipOracle, MembershipStatus};
pub use message::{HistoryStore, Message, MessageAction};

#[cfg(test)]
pub use membership::MockMembershipOracle;
#[cfg(test)]
pub use message::MockHistoryStore;
