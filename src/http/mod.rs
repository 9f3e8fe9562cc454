//! HTTP relay subsystem.
//!
//! # Data Flow
//! ```text
//! POST /proxy
//!     → server.rs (Axum setup, CORS, request ID, tracing)
//!     → proxy.rs (parse & validate the relay request)
//!     → client.rs (downstream call with per-call headers)
//!     → mirror status + body back to the caller
//! ```

pub mod client;
pub mod error;
pub mod proxy;
pub mod server;

pub use client::{DownstreamClient, DownstreamResponse, ProxyMethod};
pub use error::RelayError;
pub use server::HttpServer;
