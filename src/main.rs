mod config;
mod error;
mod routes;
mod services;
mod state;

use crate::config::RelayConfig;
use crate::error::{ErrorCode, RelayError};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    // A missing .env is the normal case outside local development.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!(error = %e, "ignoring unreadable .env");
        }
    }

    if let Err(e) = run().await {
        tracing::error!(code = e.error_code(), error = %e, "relay failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), RelayError> {
    let config = RelayConfig::from_env()?;
    let addr = config.bind_addr();

    let app = routes::app(state::AppState::new(config));
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(%addr, "corkboard relay listening");
    axum::serve(listener, app).await?;
    Ok(())
}
