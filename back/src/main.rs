use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use stockwatch::{
    BrowserSource, Cli, Coordinator, HttpSource, MonitorConfig, ProcessState, SnapshotSource,
    SourceKind, run_schedule, server,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,stockwatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MonitorConfig::try_from(Cli::parse()).context("Invalid configuration")?;
    tracing::info!(url = %config.url, source = ?config.source, "Starting stock monitor");

    let source: Arc<dyn SnapshotSource> = match config.source {
        SourceKind::Browser => Arc::new(BrowserSource::new(config.webdriver_url.clone())),
        SourceKind::Http => Arc::new(HttpSource::new().context("Failed to build HTTP client")?),
    };

    let coordinator = Arc::new(Coordinator::new(
        source,
        ProcessState::new(),
        config.url.clone(),
        config.timeout,
    ));

    if config.once {
        let outcome = coordinator.trigger().await;
        tracing::info!(?outcome, "Single cycle finished");
        let view = coordinator.state().read();
        println!(
            "{}",
            serde_json::to_string_pretty(&view).context("Failed to serialize state")?
        );
        return Ok(());
    }

    tokio::spawn(run_schedule(Arc::clone(&coordinator), config.interval));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("State API listening on http://{}/api/state", config.bind);

    axum::serve(listener, server::router(coordinator))
        .await
        .context("Server error")?;

    Ok(())
}
