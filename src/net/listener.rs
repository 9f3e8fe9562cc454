//! TCP listener binding.
//!
//! # Responsibilities
//! - Bind the HTTP and WebSocket listeners to their configured addresses
//! - Classify bind failures so startup can report them distinctly

use std::io::ErrorKind;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

/// Error type for listener binding.
#[derive(Debug, Error)]
pub enum BindError {
    /// The address could not be parsed.
    #[error("invalid bind address '{address}': {source}")]
    InvalidAddress {
        address: String,
        source: std::net::AddrParseError,
    },

    /// `EACCES`: the port is privileged.
    #[error("Port {port} requires elevated privileges")]
    PermissionDenied { port: u16, source: std::io::Error },

    /// `EADDRINUSE`: another socket owns the port.
    #[error("Port {port} is already in use")]
    AddrInUse { port: u16, source: std::io::Error },

    /// Anything else the OS reported while binding.
    #[error("failed to bind {addr}: {source}")]
    Other {
        addr: SocketAddr,
        source: std::io::Error,
    },
}

impl BindError {
    /// Map an I/O error from `bind` onto the known failure kinds.
    pub fn classify(addr: SocketAddr, source: std::io::Error) -> Self {
        match source.kind() {
            ErrorKind::PermissionDenied => Self::PermissionDenied {
                port: addr.port(),
                source,
            },
            ErrorKind::AddrInUse => Self::AddrInUse {
                port: addr.port(),
                source,
            },
            _ => Self::Other { addr, source },
        }
    }

    /// Whether this failure has a dedicated startup message.
    pub fn is_recognized(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. } | Self::AddrInUse { .. })
    }
}

/// Bind a TCP listener on `address`.
pub async fn bind(address: &str) -> Result<TcpListener, BindError> {
    let addr: SocketAddr = address.parse().map_err(|source| BindError::InvalidAddress {
        address: address.to_string(),
        source,
    })?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| BindError::classify(addr, e))?;

    tracing::debug!(address = %addr, "Listener bound");
    Ok(listener)
}
