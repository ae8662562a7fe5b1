use anyhow::{Context, Result};
use btc_handshake::{Config, Message, Session};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("starting bitcoin handshake with {}", config.node_address);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                // the session keeps running, it just cannot be interrupted
                tracing::error!("Failed to listen for ctrl-c: {}", err);
                return;
            }
            tracing::info!("Interrupted, closing session");
            cancel.cancel();
        }
    });

    let mut messages = Session::new(&config, cancel)
        .connect()
        .await
        .context("Failed to start session")?;

    while let Some(message) = messages.recv().await {
        match message {
            Message::Raw(raw) => tracing::info!(
                "Received {} ({} bytes)",
                raw.header.command(),
                raw.body.len()
            ),
            other => tracing::info!("Received {:?}", other),
        }
    }

    tracing::info!("Session closed");

    Ok(())
}
