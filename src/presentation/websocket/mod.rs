//! WebSocket Gateway
//!
//! Bridges one socket to one serving session.

pub mod handler;
pub mod messages;

pub use handler::ws_handler;
pub use messages::{parse_frame, ClientFrame, FrameError, Inbound, ServerFrame};
