mod api;
mod core;
mod infra;
mod models;

use axum::{routing::{get, post}, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::chat::chat_query;
use crate::api::map::{export_csv, health, map_from_sql};
use crate::infra::config::AppConfig;
use crate::infra::db_external::PgStore;
use crate::infra::llm::LlmRouter;

pub mod ax_state {
    use crate::infra::config::AppConfig;
    use crate::infra::db_external::DataStore;
    use crate::infra::llm::ModelSelector;
    use std::sync::Arc;

    pub struct AppState {
        pub store: Arc<dyn DataStore>,
        pub llm: Arc<dyn ModelSelector>,
        pub config: AppConfig,
    }
}

fn init_logging() {
    let fallback = std::env::var("FLOATCHAT_LOG_LEVEL").unwrap_or_else(|_| "info".into());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

pub fn router(state: Arc<ax_state::AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_query))
        .route("/api/map", post(map_from_sql))
        .route("/api/export", get(export_csv))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::from_env()?;
    let pool = infra::db_internal::init_pool(&config.database)?;
    let llm = LlmRouter::new(
        config.llm.api_key.clone(),
        config.llm.temperature,
        config.llm.registry.clone(),
    );

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(ax_state::AppState {
        store: Arc::new(PgStore::new(pool)),
        llm: Arc::new(llm),
        config,
    });

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("🌊 FloatChat Backend 运行在 http://{}", bind_addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
