mod config;
mod errors;
mod layout;
mod models;
mod render;
mod report;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::layout::classifier::Classifier;
use crate::layout::fonts;
use crate::layout::page_config::default_layout_config;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Report API v{}", env!("CARGO_PKG_VERSION"));

    // Resolve the report fonts once; every request reuses them
    let font_set = fonts::resolve(&config.font_candidates());
    if font_set.is_fallback() {
        warn!("No usable TrueType font found; Korean text will not render. Set FONT_DIR or FONT_PATHS");
    }

    let layout = default_layout_config();
    info!(
        page_width = layout.page_width,
        page_height = layout.page_height,
        body_size = layout.body_size,
        text_split = ?config.text_split,
        "Layout defaults loaded"
    );

    let state = AppState {
        config: config.clone(),
        fonts: font_set,
        layout: Arc::new(layout),
        classifier: Arc::new(Classifier::new(config.text_split)),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS once the frontend origin is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
