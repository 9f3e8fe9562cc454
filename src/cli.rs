//! Command-line arguments for the relay binary.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

use crate::config::validation::{validate_config, ValidationError};
use crate::config::{load_config, ConfigError, RelayConfig};

#[derive(Debug, Parser)]
#[command(name = "relay-proxy")]
#[command(about = "Local HTTP and WebSocket relay", long_about = None)]
pub struct Cli {
    /// HTTP relay port [default: 3010]
    #[arg(long = "http", value_name = "PORT")]
    pub http_port: Option<u16>,

    /// WebSocket relay port [default: 3011]
    #[arg(long = "ws", value_name = "PORT")]
    pub ws_port: Option<u16>,

    /// Interface both listeners bind to [default: 0.0.0.0]
    #[arg(long, value_name = "IP")]
    pub host: Option<IpAddr>,

    /// Optional TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Defaults, then the config file, then flags.
    pub fn resolve(&self) -> Result<RelayConfig, ConfigError> {
        let config = match &self.config {
            Some(path) => load_config(path)?,
            None => RelayConfig::default(),
        };
        self.apply(config)
    }

    /// Layer the flags over `config` and re-validate.
    pub fn apply(&self, mut config: RelayConfig) -> Result<RelayConfig, ConfigError> {
        config.http.bind_address =
            override_address(&config.http.bind_address, self.host, self.http_port, "http.bind_address")?;
        config.ws.bind_address =
            override_address(&config.ws.bind_address, self.host, self.ws_port, "ws.bind_address")?;

        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

fn override_address(
    current: &str,
    host: Option<IpAddr>,
    port: Option<u16>,
    field: &'static str,
) -> Result<String, ConfigError> {
    if host.is_none() && port.is_none() {
        return Ok(current.to_string());
    }

    let mut addr: SocketAddr = current.parse().map_err(|_| {
        ConfigError::Validation(vec![ValidationError::InvalidAddress {
            field,
            value: current.to_string(),
        }])
    })?;
    if let Some(host) = host {
        addr.set_ip(host);
    }
    if let Some(port) = port {
        addr.set_port(port);
    }
    Ok(addr.to_string())
}
