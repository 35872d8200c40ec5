//! Asclepius API server binary.
//!
//! Usage:
//!   asclepius-api --config config.toml
//!   asclepius-api --port 8080 --bind 0.0.0.0
//!   asclepius-api --docs-dir ./data/docs
//!
//! # Environment Variables
//!
//! - `ASCLEPIUS_CONFIG` - Path to the config file
//! - `OPENAI_API_KEY` - API key for the openai provider
//! - `TAVILY_API_KEY` - API key for web search

use std::path::PathBuf;
use std::sync::Arc;

use asclepius_api::{serve, AppConfig, AppState};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Medical assistant API server", long_about = None)]
struct Args {
    /// Path to a config.toml file
    #[arg(short, long, env = "ASCLEPIUS_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// Directory of medical documents for the knowledge store
    #[arg(long)]
    docs_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,asclepius_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading configuration");
            AppConfig::from_file(path)?
        }
        None => {
            tracing::info!("Using default configuration");
            AppConfig::default()
        }
    };

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(docs_dir) = args.docs_dir {
        config.knowledge.docs_dir = Some(docs_dir);
    }

    let state = AppState::from_config(&config).await?;
    serve(Arc::new(state), &config.server).await?;

    Ok(())
}
