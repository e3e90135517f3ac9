use axum::{Extension, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use veo_studio::credentials::KeySelector;
use veo_studio::{handlers, middleware, AppState, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_logging()?;

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    tracing::info!(
        "Configuration - Veo API key: {}, model: {}, poll interval: {}s, max poll failures: {}, prompt locale: {:?}",
        if config.api_key.is_some() { "✅" } else { "❌ (select one via POST /api/key)" },
        config.model,
        config.poll_interval.as_secs(),
        config.max_poll_failures,
        config.prompt_locale
    );

    let bind_addr = config.bind_addr.clone();
    let max_upload_bytes = config.max_upload_bytes;
    let shared_state = Arc::new(AppState::new(config));

    let app = Router::new()
        .merge(handlers::form::form_routes(max_upload_bytes))
        .merge(handlers::generate::generate_routes())
        .merge(handlers::key::key_routes())
        .route("/api/status", axum::routing::get(api_status))
        .layer(axum::middleware::from_fn(middleware::logging::request_logging_middleware))
        .layer(CorsLayer::permissive())
        .layer(Extension(shared_state));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

// Production-grade logging configuration
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,veo_studio=trace,reqwest=info,hyper=info,tower=info".to_string()
        } else {
            "info,veo_studio=info,reqwest=warn,hyper=warn,tower=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        // JSON logging for log aggregation
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!("🎬 Veo studio starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Build mode: {}", if cfg!(debug_assertions) { "development" } else { "production" });
    tracing::info!("Log level: {}", log_level);

    Ok(())
}

// API Status endpoint
async fn api_status(Extension(state): Extension<Arc<AppState>>) -> axum::response::Json<serde_json::Value> {
    use serde_json::json;

    let operation = state.operation.read().await.snapshot();

    axum::response::Json(json!({
        "status": "operational",
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "veo_api": state.config.base_url,
            "api_key_selected": state.key_selector.has_selected_key().await,
        },
        "generation": {
            "model": state.config.model,
            "poll_interval_secs": state.config.poll_interval.as_secs(),
            "max_poll_failures": state.config.max_poll_failures,
            "prompt_locale": state.config.prompt_locale,
            "stored_videos": state.videos.len(),
        },
        "operation": operation,
        "endpoints": {
            "form": "/api/form",
            "generate": "/api/generate",
            "operation": "/api/operation",
            "key": "/api/key",
            "videos": "/videos/:id"
        }
    }))
}
