//! Power Monitor - Main Entry Point

use anyhow::Context;
use api::{init_logging, run_server, Settings};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("Failed to load settings")?;
    init_logging(&settings.logging)?;

    info!("=== Power Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    if let Some(name) = &settings.site.location_name {
        info!("Watching: {}", name);
    }

    run_server(settings).await
}
