use anyhow::Result;
use axum::Router;
use bugly::{
    config::{AppConfig, RunMode},
    routes::routes::routes,
    services::{auth_service::seed_identity, store::EntityStore},
    state::AppState,
};
use std::io::ErrorKind;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + run mode ---
    let (cfg, mode) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting bugly with config: {:?}", cfg);

    // --- Initialize SQLite connection ---
    let store = EntityStore::connect(&cfg.database_url, cfg.max_connections).await?;

    match mode {
        RunMode::Migrate => {
            store.migrate().await?;
            tracing::info!("Database migration complete.");
            return Ok(());
        }
        RunMode::SeedAdmin { email, password } => {
            store.migrate().await?;
            seed_identity(&store, &email, &password).await?;
            return Ok(());
        }
        RunMode::Serve => {}
    }

    store.migrate().await?;

    for warning in cfg.startup_warnings() {
        tracing::warn!("{}", warning);
    }

    // --- Initialize services ---
    let secret = match &cfg.token_secret {
        Some(secret) => secret.clone(),
        None => format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()),
    };
    let state = AppState::new(store, secret.as_bytes(), cfg.token_ttl());

    // --- Build router ---
    let app: Router = routes(state, cfg.require_auth);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
