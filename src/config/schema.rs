//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// HTTP relay listener.
    pub http: HttpConfig,

    /// WebSocket relay listener.
    pub ws: WsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HTTP relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address (e.g., "0.0.0.0:3010").
    pub bind_address: String,

    /// Maximum accepted `/proxy` body size in bytes.
    pub max_body_bytes: usize,

    /// Timeout applied to each downstream call. `None` waits indefinitely.
    pub downstream_timeout_secs: Option<u64>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3010".to_string(),
            max_body_bytes: 100 * 1024, // 100KB
            downstream_timeout_secs: None,
        }
    }
}

/// WebSocket relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WsConfig {
    /// Bind address (e.g., "0.0.0.0:3011").
    pub bind_address: String,

    /// Send an `upstream-error` frame to the client when its upstream fails.
    pub report_upstream_errors: bool,

    /// Frames buffered towards an upstream that has not finished its handshake.
    pub upstream_queue_capacity: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3011".to_string(),
            report_upstream_errors: false,
            upstream_queue_capacity: 256,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
