//! Periodic driver that feeds a resilient connection until its reconnect
//! budget is spent.
//!
//! Run against any WebSocket echo server, e.g.:
//!
//! ```sh
//! cargo run --example driver
//! ```

use std::time::Duration;

use tracing::{info, warn};
use ws_lifeline::{Config, ConnectionManager, Handlers, Payload};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let handlers = Handlers::new()
        .on_open(|| info!("connection open"))
        .on_close(|reason| warn!(?reason, "connection closed"))
        .on_error(|error| warn!(%error, "transport error"))
        .on_message(|payload| match payload {
            Payload::Text(text) => info!(%text, "server replied"),
            Payload::Binary(bytes) => info!(len = bytes.len(), "server sent binary"),
            _ => {}
        });

    let connection = ConnectionManager::connect("ws://localhost:9547/", Config::default(), handlers)?;

    let mut counter = 1_u64;
    loop {
        if connection.is_reconnect_exhausted() {
            info!("reconnect budget spent; driver stops sending");
            break;
        }
        connection.send_text(format!("driver message {counter}"));
        counter += 1;
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    Ok(())
}
