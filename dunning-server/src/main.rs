use std::sync::Arc;

use clap::Parser;
use dunning_core::config::{secret_from_env, OPENAI_API_KEY_ENV, SHEETS_API_KEY_ENV};
use dunning_core::DunningConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use dunning_server::http::{self, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "dunning.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match DunningConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging — RUST_LOG wins over [service] log_level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let openai_api_key = match secret_from_env(OPENAI_API_KEY_ENV) {
        Some(k) => k,
        None => {
            tracing::error!("{} is not set — refusing to start", OPENAI_API_KEY_ENV);
            std::process::exit(1);
        }
    };
    let sheets_api_key = secret_from_env(SHEETS_API_KEY_ENV);

    let state = Arc::new(AppState::from_config(config, &openai_api_key, sheets_api_key)?);
    tracing::info!(
        debtor_source = state.debtors.source_name(),
        transcript_role = ?state.policy.transcript_role,
        "Dunning server configured"
    );

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    http::start_http_server(state, tx.subscribe()).await?;

    Ok(())
}
