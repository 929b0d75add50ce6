//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **MessageService**: Message creation, lifecycle announcements, history
//!   reads and session startup
//! - **ServingSession**: Per-connection fan-out loop

pub mod message_service;
pub mod serving_session;

// Re-export message service types
pub use message_service::{
    CreateMessageDto, LifecycleEvent, MessageError, MessageService, MessageServiceImpl,
    SessionChannels, MAX_TEXT_LENGTH,
};

// Re-export session types
pub use serving_session::{ServingSession, SessionEnd, SessionError, SessionState};
