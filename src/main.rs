use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use lms_backend::{
    config::{get_config, init_config},
    routes,
    services::completion_service::WebhookCompletionSink,
    services::quiz_service::InMemoryQuizCatalog,
    store::MemoryStore,
    AppState,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    init_config()?;
    let config = get_config();

    let catalog = Arc::new(InMemoryQuizCatalog::new());
    if let Some(path) = &config.quiz_catalog_path {
        let loaded = catalog.load_file(path)?;
        info!(loaded, path = %path, "quiz catalog loaded");
    }

    let store = Arc::new(MemoryStore::new());
    let completion = Arc::new(WebhookCompletionSink::new(
        config.completion_webhook_url.clone(),
        config.webhook_secret.clone(),
    ));
    let app_state = AppState::new(store, catalog, completion, config.engine.clone());

    {
        let attempts = app_state.attempt_service.clone();
        let interval = Duration::from_secs(config.sweep_interval_seconds.max(1));
        tokio::spawn(async move {
            loop {
                if let Err(e) = attempts.sweep_overdue().await {
                    tracing::error!(error = ?e, "expiry sweep error");
                }
                tokio::time::sleep(interval).await;
            }
        });
    }

    let app = routes::router(app_state, config.public_rps)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
