// Student Import - Web Server
// Upload endpoint and read-back API with Axum

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use student_import::server::{build_router, AppState};
use student_import::{AppConfig, StudentStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "student_import=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = AppConfig::from_env()?;
    tracing::info!(
        address = %config.bind_address(),
        database = %config.database_path.display(),
        upload_dir = %config.upload_dir.display(),
        commit_policy = config.commit_policy.name(),
        "Loaded server configuration"
    );

    // --- Database ---
    let store = StudentStore::open(&config.database_path, config.busy_timeout)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;

    let addr = config.bind_address();
    let state = AppState::new(store, config);
    let db = state.db.clone();
    let app = build_router(state);

    // --- Serve ---
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    tracing::info!(address = %addr, "Server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Teardown ---
    // The router (and every clone of the state) is gone once serve returns
    match std::sync::Arc::try_unwrap(db) {
        Ok(mutex) => {
            let store = mutex.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
            store.close().context("Failed to close database")?;
        }
        Err(_) => tracing::warn!("Database still shared at shutdown; leaving it to drop"),
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
