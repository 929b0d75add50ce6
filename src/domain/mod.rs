//! # Domain Layer
//!
//! The domain layer contains the core types of the fan-out engine.
//! It is independent of any transport or storage concerns.
//!
//! ## Structure
//!
//! - **entities**: Messages, chat memberships, and the store/oracle traits
//! - **value_objects**: Topics and pagination types
//! - **bus**: The publish/subscribe contract sessions are built on
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Store, oracle, and bus traits define the contracts; implementations
//!   live in the infrastructure layer

pub mod bus;
pub mod entities;
pub mod value_objects;

// Re-export commonly used types
pub use bus::{MessageBus, Subscription};
pub use entities::*;
pub use value_objects::*;
