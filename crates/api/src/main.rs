use anyhow::{Context, Result};
use tracing::{info, warn};

use toggle_manager_api::app::{create_app, AppState};
use toggle_manager_api::config::Config;
use toggle_manager_api::middleware::{init_metrics, logging::init_logging};
use toggle_manager_api::services::admin_bootstrap::bootstrap_admins;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load().context("Failed to load configuration")?;

    init_logging(&config.logging).context("Failed to initialize logging")?;
    init_metrics().context("Failed to initialize metrics")?;

    info!("Starting Feature Toggle Manager v{}", env!("CARGO_PKG_VERSION"));

    let pool = persistence::db::create_pool(&config.database.pool_config())
        .await
        .context("Failed to connect to the database")?;

    info!("Running database migrations...");
    persistence::db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    info!("Migrations completed");

    bootstrap_admins(&pool, &config.auth)
        .await
        .context("Failed to bootstrap admin users")?;

    if config.azure_ad.client_secret().is_none() {
        warn!("FTM__AZURE_AD__CLIENT_SECRET is not set; Azure discovery endpoints are disabled");
    }

    let addr = config.socket_addr().context("Invalid server address")?;
    let state = AppState::from_config(config, pool).context("Failed to build services")?;
    let app = create_app(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
