//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Configured address
//!     → listener.rs (bind, classify EACCES / EADDRINUSE)
//!     → Hand off to the HTTP or WebSocket server
//!
//! Accepted WebSocket client
//!     → connection.rs (unique ConnectionId for session keying and logs)
//!
//! Caller-supplied headers (HTTP relay and WebSocket connect frames)
//!     → headers.rs (JSON object → name/value strings)
//! ```

pub mod connection;
pub mod headers;
pub mod listener;

pub use connection::ConnectionId;
pub use listener::{bind, BindError};
