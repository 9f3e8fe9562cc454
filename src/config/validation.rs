//! Configuration validation.
//!
//! Serde handles the syntax; this covers the semantic checks. Every problem
//! is collected so a bad file is reported in one pass.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::RelayConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("http and ws listeners share the address {0}")]
    DuplicateAddress(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("unknown log level '{0}'")]
    UnknownLogLevel(String),
}

/// Validate a configuration, returning every error found.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let http_addr = parse_address("http.bind_address", &config.http.bind_address, &mut errors);
    let ws_addr = parse_address("ws.bind_address", &config.ws.bind_address, &mut errors);

    if let (Some(http), Some(ws)) = (http_addr, ws_addr) {
        // Port 0 asks the OS for a fresh port, so two of them never collide.
        if http == ws && http.port() != 0 {
            errors.push(ValidationError::DuplicateAddress(http.to_string()));
        }
    }

    if config.http.max_body_bytes == 0 {
        errors.push(ValidationError::Zero("http.max_body_bytes"));
    }
    if config.http.downstream_timeout_secs == Some(0) {
        errors.push(ValidationError::Zero("http.downstream_timeout_secs"));
    }
    if config.ws.upstream_queue_capacity == 0 {
        errors.push(ValidationError::Zero("ws.upstream_queue_capacity"));
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn parse_address(
    field: &'static str,
    value: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<SocketAddr> {
    match value.parse() {
        Ok(addr) => Some(addr),
        Err(_) => {
            errors.push(ValidationError::InvalidAddress {
                field,
                value: value.to_string(),
            });
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&RelayConfig::default()).is_ok());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = RelayConfig::default();
        config.http.bind_address = "not-an-address".into();
        config.ws.upstream_queue_capacity = 0;
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::Zero("ws.upstream_queue_capacity")));
        assert!(errors.contains(&ValidationError::UnknownLogLevel("loud".into())));
    }

    #[test]
    fn rejects_shared_listener_address() {
        let mut config = RelayConfig::default();
        config.ws.bind_address = config.http.bind_address.clone();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::DuplicateAddress("0.0.0.0:3010".into())]
        );
    }

    #[test]
    fn ephemeral_ports_may_repeat() {
        let mut config = RelayConfig::default();
        config.http.bind_address = "127.0.0.1:0".into();
        config.ws.bind_address = "127.0.0.1:0".into();
        assert!(validate_config(&config).is_ok());
    }
}
