mod applications;
mod config;
mod db;
mod errors;
mod ingest;
mod models;
mod routes;
mod state;
#[cfg(test)]
mod testing;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::applications::store::PgApplicationStore;
use crate::config::Config;
use crate::db::create_pool;
use crate::ingest::identity::SupabaseAuthVerifier;
use crate::ingest::source::ChromiumLauncher;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting jobtrack API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    let store = Arc::new(PgApplicationStore::new(db));

    // Identity is checked against the Supabase auth endpoint
    let verifier = Arc::new(SupabaseAuthVerifier::new(
        &config.supabase_url,
        config.supabase_service_role_key.clone(),
    )?);
    info!("Anonymous ingestion runs: {:?}", config.identity_policy);

    // One headless Chromium per ingestion run
    let launcher = Arc::new(ChromiumLauncher::new(config.browser.clone()));
    info!(
        "Listing source: {} (max {} pages, {} per page)",
        config.extraction.target_url,
        config.extraction.max_pages,
        config.extraction.listings_per_page
    );

    let port = config.port;
    let state = AppState {
        config: Arc::new(config),
        store,
        verifier,
        launcher,
    };

    let app = build_router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
