//! ubba-relay: serves `POST /api/ubba-ai`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ubba_relay::config::API_KEY_ENV;
use ubba_relay::{AppState, OpenAiBackend, RelayConfig, router};

#[derive(Parser, Debug)]
#[command(name = "ubba-relay", version, about = "Let players talk to UBBA")]
struct Args {
    /// Config file (TOML); defaults are used when it does not exist
    #[arg(short, long, default_value = "ubba-relay.toml")]
    config: PathBuf,

    /// Listen address (overrides the config file)
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = RelayConfig::load(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if config.api_key.is_none() {
        warn!("{} is not set; every chat request will fail", API_KEY_ENV);
    }

    let backend = OpenAiBackend::new(&config).context("Failed to build HTTP client")?;
    let bind = config.bind.clone();
    let model = config.model.clone();
    let app = router(AppState::new(config, Arc::new(backend)));

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!(model = %model, "Listening on http://{}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")?;
    Ok(())
}
