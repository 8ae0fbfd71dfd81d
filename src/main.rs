use std::sync::Arc;

use checkout_customizer::{
    config::{Config, StoreBackend},
    db,
    routes::{create_router, AppState},
    services::commerce::{CommerceStore, InMemoryStore, PgCommerceStore, WooCommerceStore},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("checkout_customizer=debug,tower_http=debug")),
        )
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn CommerceStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = db::create_pool(&config.database_url).await?;
            db::run_migrations(&pool).await?;
            Arc::new(PgCommerceStore::new(pool))
        }
        StoreBackend::Woocommerce => {
            Arc::new(WooCommerceStore::new(config.woocommerce_credentials()?))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; nothing is persisted");
            Arc::new(InMemoryStore::new())
        }
    };

    let state = Arc::new(AppState::from_config(store, &config));
    let app = create_router(state);

    let address = config.server_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        address = %address,
        store = ?config.store_backend,
        recommendation_limit = config.recommendation_limit,
        "Server running"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
