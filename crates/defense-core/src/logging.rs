// tracing/tracing-subscriber initialization (SPEC_FULL.md §10.3), shared by
// all three bins. A one-line init-at-startup call, same shape as a plain
// `env_logger::init()` but backed by the structured tracing façade.

use tracing_subscriber::{fmt, EnvFilter};

pub fn init(service_name: &str) {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .json()
        .init();

    tracing::info!(service = service_name, "logging initialized");
}
