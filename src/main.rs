//! Local HTTP and WebSocket relay.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────┐
//!                  │                 RELAY PROXY                  │
//!  POST /proxy     │  ┌──────────┐   ┌─────────┐   ┌───────────┐  │
//!  ────────────────┼─▶│   http   │──▶│  proxy  │──▶│downstream │──┼──▶ target URL
//!  ◀───────────────┼──│  server  │◀──│ handler │◀──│  client   │◀─┼───
//!                  │  └──────────┘   └─────────┘   └───────────┘  │
//!                  │                                              │
//!  WS client       │  ┌──────────┐   ┌─────────┐   ┌───────────┐  │
//!  ◀──────────────▶┼─▶│    ws    │──▶│ session │◀─▶│ upstream  │◀─┼──▶ target WS
//!                  │  │  server  │   │registry │   │   task    │  │
//!                  │  └──────────┘   └─────────┘   └───────────┘  │
//!                  │                                              │
//!                  │   config · net · lifecycle · observability   │
//!                  └──────────────────────────────────────────────┘
//! ```

use clap::Parser;

use relay_proxy::cli::Cli;
use relay_proxy::lifecycle::{signals, startup::Relay, Shutdown};
use relay_proxy::observability::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.resolve()?;

    logging::init(&config.observability.log_level);

    tracing::info!("relay-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        http_address = %config.http.bind_address,
        ws_address = %config.ws.bind_address,
        downstream_timeout_secs = ?config.http.downstream_timeout_secs,
        "Configuration loaded"
    );

    let relay = match Relay::bind(&config).await {
        Ok(relay) => relay,
        Err(e) if e.is_recognized() => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let shutdown = Shutdown::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        on_signal.trigger();
    });

    if let Err(e) = relay.serve(shutdown).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
