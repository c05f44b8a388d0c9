use std::sync::Arc;

use anyhow::Context;
use dossier_common::storage::filesystem::FilesystemBlobStore;
use tracing::{Level, info};

use dossier_server::config::AppConfig;
use dossier_server::database::init_db;
use dossier_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = init_db(&config.database.url)
        .await
        .context("Failed to connect to database")?;
    info!("Database ready");

    let blob_store = FilesystemBlobStore::open(
        config.storage.blob_dir.clone(),
        config.storage.max_blob_size,
    )
    .await
    .context("Failed to open blob store")?;
    info!(dir = %config.storage.blob_dir.display(), "Blob store ready");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState {
        db,
        blob_store: Arc::new(blob_store),
        config,
    };
    let app = dossier_server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running at http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
