//! Observability subsystem.
//!
//! Structured logging only: every subsystem emits `tracing` events with
//! fields (`port`, `connection_id`, `url`, ...), and the HTTP router carries
//! a request ID plus tower-http's trace layer.

pub mod logging;
