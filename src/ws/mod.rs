//! WebSocket relay subsystem.
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Relay ←──── WebSocket frames ────→ Upstream
//!
//! server.rs    accept upgrade, assign ConnectionId
//! session.rs   per-client loop, SessionRegistry of upstream handles
//! frame.rs     connect vs. data classification
//! upstream.rs  upstream connect + pump task
//! ```
//!
//! # Design Decisions
//! - The first frame carrying a `url` opens the upstream; later ones replace it
//! - Frame-level forwarding (no message rewriting), text stays text
//! - Upstream failures are logged, optionally reported, never reconnected

pub mod frame;
pub mod server;
pub mod session;
pub mod upstream;

pub use server::WsServer;
pub use session::SessionRegistry;
