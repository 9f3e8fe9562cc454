//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Resolve config → Bind both listeners → Run both servers
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Close WebSocket sessions → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Both listeners bind before either serves, so a port clash fails fast
//! - A server error after startup is fatal for the whole process

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
