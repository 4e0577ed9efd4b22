mod cli;
mod config;
mod error;
mod model;
mod providers;
mod sync;
mod util;

use std::future::Future;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;
use providers::alexa::{AlexaListClient, FormLogin};
use providers::trello::TrelloClient;
use providers::ListSource;
use sync::{SyncDriver, SyncOptions};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alexa_trello=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Config problems must stop us before any request goes out
    let config_path = config::resolve_config_path(cli.config.as_deref());
    let config = config::load_config(&config_path)?;
    let endpoints = config.amazon.endpoints()?;
    tracing::debug!("Loaded config from {}", config_path.display());

    let login = FormLogin::new(
        config.amazon.email.clone(),
        config.amazon.password.clone(),
        endpoints.portal.clone(),
    );
    let alexa = AlexaListClient::connect(&login, endpoints).await?;
    let trello = TrelloClient::new(&config.trello);

    let options = SyncOptions::from_config(&config, cli.single_run, cli.clear_source);
    let driver = SyncDriver::new(&alexa, &trello, options);

    let result = tokio::select! {
        result = driver.run() => result,
        _ = shutdown_signal(tokio::signal::ctrl_c()) => {
            tracing::info!("Shutdown signal received, stopping...");
            Ok(())
        }
    };

    alexa.logout().await;
    result
}

/// Resolve once `signal` fires. If the handler cannot be installed, never resolve.
async fn shutdown_signal<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::error!("Unable to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
