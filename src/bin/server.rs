//! timestamp-service binary.
//!
//! Starts the HTTP server, stores the current time through it, reads the
//! value back and prints it. That printed number is the only thing written
//! to stdout; logs go to stderr.
//!
//! # Environment Variables
//!
//! - `PORT` — HTTP port (default: 10000)
//! - `TIMESTAMP_HOST` — bind address (default: 0.0.0.0)
//! - `EXIT_AFTER_DEMO` — exit after printing instead of serving until Ctrl-C
//! - `RUST_LOG` — Tracing filter (default: "error")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin timestamp-service
//! ```

use anyhow::Context;
use tokio::sync::oneshot;

use timestamp_service::server::{self, AppState};
use timestamp_service::client::run_demo;
use timestamp_service::{ServiceConfig, Timestamp, TimestampClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "error".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("timestamp-service {} started", timestamp_service::VERSION);

    let config = ServiceConfig::from_env()?;
    let bind_addr = config.bind_addr();

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    let bound = listener.local_addr()?;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server_task = tokio::spawn(server::serve(listener, AppState::new(), async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("Ctrl-C received, shutting down"),
            _ = stop_rx => {}
        }
    }));

    // Demonstration round-trip against our own server.
    let client = TimestampClient::new(config.client_base_url(bound));
    run_demo(&client, Timestamp::now(), &mut std::io::stdout())
        .await
        .context("Demo round-trip failed")?;

    if config.exit_after_demo {
        let _ = stop_tx.send(());
    }

    server_task.await?.context("Server failed")?;
    Ok(())
}
