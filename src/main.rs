//! Invoice Agent - HTTP Server Entry Point
//!
//! Starts the HTTP server that serves the dashboard and the invoice API.

use invoice_agent::{api, config::Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "invoice_agent=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(
        model = %config.llm.model,
        mode = ?config.payment_mode,
        dev_mode = config.dev_mode,
        "Loaded configuration"
    );
    if !config.auth.auth_required(config.dev_mode) {
        info!("Dashboard auth is disabled");
    }

    info!("Starting server on {}:{}", config.host, config.port);
    api::serve(config).await?;

    Ok(())
}
