use std::sync::Arc;

use buddychat::config::AppConfig;
use buddychat::responder::WebhookClient;
use buddychat::services::live::{self, LiveHub};
use buddychat::services::store::PgChatStore;
use buddychat::state::AppState;
use buddychat::{db, routes};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env().expect("invalid configuration");

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("database init failed");

    let responder = WebhookClient::new(&config.webhook).expect("webhook client build failed");
    tracing::info!(url = responder.url(), "webhook responder configured");

    let hub = Arc::new(LiveHub::new());

    // Fan store change notifications out to live feeds.
    let _listener = live::spawn_listener(pool.clone(), hub.clone());

    let state = AppState::new(Arc::new(PgChatStore::new(pool)), Arc::new(responder), hub, &config);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, dedup_window_ms = config.dedup_window_ms, "buddychat listening");
    axum::serve(listener, app).await.expect("server failed");
}
