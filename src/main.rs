use std::sync::Arc;

use tower_http::cors::CorsLayer;

use guestpitch::api::{ApiState, api_routes};
use guestpitch::attribution::AttributionLedger;
use guestpitch::config::AppConfig;
use guestpitch::conversations::ConversationStore;
use guestpitch::pipeline::PipelineController;
use guestpitch::shows::ShowRegistry;
use guestpitch::store::{Database, LibSqlBackend};
use guestpitch::templates::TemplateStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Arc::new(AppConfig::from_env());

    eprintln!("🎙 Guestpitch v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api", config.port);
    eprintln!("   Database: {}", config.db_path);
    eprintln!("   Max follow-ups per show: {}", config.max_followups);

    // ── Database ─────────────────────────────────────────────────────────
    let db_path = std::path::Path::new(&config.db_path);
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_local(db_path).await.unwrap_or_else(
        |e| {
            eprintln!("Error: Failed to open database at {}: {}", config.db_path, e);
            std::process::exit(1);
        },
    ));

    // ── Services ─────────────────────────────────────────────────────────
    let state = ApiState {
        registry: Arc::new(ShowRegistry::new(Arc::clone(&db))),
        conversations: Arc::new(ConversationStore::new(Arc::clone(&db))),
        pipeline: Arc::new(PipelineController::new(
            Arc::clone(&db),
            config.max_followups,
        )),
        templates: Arc::new(TemplateStore::new(Arc::clone(&db))),
        attribution: Arc::new(AttributionLedger::new(
            Arc::clone(&db),
            config.attribution_ttl_days,
        )),
        config: Arc::clone(&config),
    };

    let app = api_routes(state).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Guestpitch API server started");
    axum::serve(listener, app).await?;

    Ok(())
}
