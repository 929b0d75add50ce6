//! Data Transfer Objects
//!
//! DTOs for API request/response serialization.

pub mod request;
pub mod response;

pub use request::{HistoryQuery, SendMessageRequest};
pub use response::{HistoryResponse, MessageResponse};
