use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::signal;
use tracing::info;

use censusgate::api::{create_router, AppState};
use censusgate::authorizer::ActionAuthorizer;
use censusgate::census::client::HttpCensusClient;
use censusgate::census::CensusApi;
use censusgate::config::Config;
use censusgate::observability::init_tracing;
use censusgate::scopes::ScopeRegistry;
use censusgate::storage::{AuthorizationStore, MemoryAuthorizationStore};
use censusgate::workflow::VerificationEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration
    let config = Config::parse();

    // Initialize tracing
    init_tracing(&config.log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting censusgate verification gateway"
    );

    // Load the scope tree; a missing file means the deployment only
    // distinguishes the local country root.
    let scopes = match config.scopes_path {
        Some(ref path) => {
            let registry = ScopeRegistry::load(path)?;
            info!(path = %path.display(), scopes = registry.len(), "Scope tree loaded");
            Arc::new(registry)
        }
        None => {
            info!(local = %config.local_scope, "No scope file configured, using local root only");
            Arc::new(ScopeRegistry::default_local(&config.local_scope))
        }
    };

    let census: Arc<dyn CensusApi> = Arc::new(HttpCensusClient::with_timeout(
        &config.census_url,
        config.census_timeout(),
    )?);
    let store: Arc<dyn AuthorizationStore> = Arc::new(MemoryAuthorizationStore::new());

    let engine = Arc::new(VerificationEngine::new(
        census.clone(),
        store.clone(),
        scopes,
        config.local_scope.clone(),
        config.minimum_age,
    ));
    let authorizer = Arc::new(ActionAuthorizer::new(census, store));

    // Create application state
    let state = Arc::new(AppState {
        engine,
        authorizer,
        start_time: Instant::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    });

    // Create router
    let app = create_router(state);

    // Parse listen address
    let addr: SocketAddr = config.listen_addr.parse()?;

    info!(addr = %addr, "Starting HTTP server");

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
