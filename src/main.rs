use anyhow::Context;
use fxreplay::{
    api, init_db, Config, CsvPriceSource, HttpBackend, LocalStore, PriceSource, Repository,
    StoreKind, TradeController, TransactionStore,
};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("configuration error")?;
    let backend = Arc::new(HttpBackend::new(config.backend_url.clone()));

    let prices: Arc<dyn PriceSource> = match &config.price_csv_path {
        Some(path) => Arc::new(CsvPriceSource::new(path)),
        None => backend.clone(),
    };

    let store: Arc<dyn TransactionStore> = match config.transaction_store {
        StoreKind::Http => backend,
        StoreKind::Sqlite => {
            let path = config
                .database_path
                .as_deref()
                .context("DATABASE_PATH is required for the sqlite store")?;
            let pool = init_db(path)
                .await
                .with_context(|| format!("failed to initialize database at {}", path))?;
            Arc::new(LocalStore::new(Arc::new(Repository::new(pool))))
        }
    };

    let controller = Arc::new(TradeController::new(
        config.session_config(),
        config.tick_interval(),
        prices,
        store,
    ));

    // The API serves the loading/unavailable state when the series is not usable.
    if let Err(e) = controller.initialize(config.auto_start).await {
        tracing::warn!("session not started: {}", e);
    }

    let app = api::create_router(api::AppState::new(controller.clone()));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    let shutdown_controller = controller.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {}", e);
            }
            shutdown_controller.shutdown();
        })
        .await
        .context("server error")?;

    Ok(())
}
