use std::sync::Arc;

use crate::config::Config;
use crate::layout::classifier::Classifier;
use crate::layout::fonts::FontSet;
use crate::layout::page_config::LayoutConfig;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Resolved once at startup; every assembly draws with the same pair.
    pub fonts: Arc<FontSet>,
    /// Default page geometry; a request may replace it wholesale.
    pub layout: Arc<LayoutConfig>,
    pub classifier: Arc<Classifier>,
}
