use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};

use inlet::api;
use inlet::app_state::AppState;
use inlet::config::Config;
use inlet::supervisor::StoreRoot;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    tracing::info!(?config, "Starting Inlet sync server");

    std::fs::create_dir_all(&config.data_dir)?;

    let app_state = Arc::new(AppState::new(
        StoreRoot::Dir(config.data_dir.clone()),
        config.pull_skip_unchanged,
    ));
    app_state
        .ensure_supervisor()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to spawn UserSupervisor: {e}"))?;

    tracing::info!("UserSupervisor started");

    // Configure CORS to allow known client origins
    let allowed_origins = config
        .cors_origins
        .iter()
        .map(|origin| HeaderValue::from_str(origin))
        .collect::<Result<Vec<_>, _>>()?;

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(3600));

    let app = api::router()
        .with_state(api::ApiState { app_state })
        .layer(cors);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting HTTP server on http://{addr}");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
