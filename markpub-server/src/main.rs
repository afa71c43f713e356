use anyhow::Context;
use markpub_cloud::{DropboxClient, DropboxOAuth, GfmRenderer, SyncEngine};
use markpub_server::{AppState, ServerConfig, router};
use markpub_store::SqliteAccountStore;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;
    info!("starting with {config:?}");

    let accounts = Arc::new(
        SqliteAccountStore::open(&config.database_path)
            .with_context(|| format!("failed to open {}", config.database_path.display()))?,
    );
    let storage = Arc::new(DropboxClient::new(config.cloud.clone())?);
    let oauth = Arc::new(DropboxOAuth::new(
        config.cloud.clone(),
        config.app_key.clone(),
        config.app_secret.clone(),
    )?);
    let engine = Arc::new(SyncEngine::new(
        storage,
        Arc::new(GfmRenderer),
        accounts.clone(),
        accounts.clone(),
        &config.cloud,
    ));

    let state = AppState::new(
        engine,
        accounts,
        oauth,
        &config.app_secret,
        config.max_concurrent_syncs,
    );
    let dispatcher = state.dispatcher.clone();

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "markpub server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("waiting for {} in-flight syncs", dispatcher.pending());
    dispatcher.wait_idle().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
}
