// GyaanForge Backend Entry Point

use anyhow::{bail, Context, Result};
use gyaanforge_core::config::AppConfig;
use gyaanforge_core::explain::{LlmActor, LlmActorHandle};
use gyaanforge_core::fs_manager::DataPaths;
use gyaanforge_core::server::{self, ServerState};
use gyaanforge_core::{preflight, storage};
use std::sync::Arc;
use tracing::{error, info};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` filters (default `info`); `GYAANFORGE_LOG_FORMAT=json` switches to bunyan JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("GYAANFORGE_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(JsonStorageLayer)
            .with(BunyanFormattingLayer::new("gyaanforge".into(), std::io::stdout))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before tracing, so RUST_LOG and the log format can come from .env
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let paths = DataPaths::new(&config.data_dir);
    paths.init().context("Failed to create data directories")?;

    let pool = storage::init_db(&paths.db_path())
        .await
        .context("Failed to initialize database")?;

    let report = preflight::run_preflight_checks(&config, &paths, &pool).await;
    if !report.ready_to_start {
        error!("{}", report.summary);
        bail!("Preflight checks failed");
    }

    let llm: Arc<dyn LlmActor> = Arc::new(LlmActorHandle::new(&config));
    let state = ServerState::new(config, pool, llm);

    info!("GyaanForge {} starting", env!("CARGO_PKG_VERSION"));
    server::start(state).await.context("Server stopped with an error")?;

    Ok(())
}
