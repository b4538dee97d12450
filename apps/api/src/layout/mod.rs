// Report layout: block classification, image matching, pagination.
// Assembly is CPU-bound and must run inside tokio::task::spawn_blocking.

pub mod assembler;
pub mod cancel;
pub mod classifier;
pub mod engine;
pub mod font_metrics;
pub mod fonts;
pub mod images;
pub mod page_config;
pub mod wrap;
