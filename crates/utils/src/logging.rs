//! provides logging helpers

use tracing::Subscriber;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Default human-readable layer writing to stderr.
pub fn get_fmt_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    layer().with_writer(std::io::stderr).with_target(true)
}

/// Env filter honouring `RUST_LOG`, falling back to `info`.
pub fn default_env_filter() -> filter::EnvFilter {
    filter::EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::INFO.into())
        .from_env_lossy()
}

/// initiate the global tracing subscriber
pub fn init() {
    let fmt_layer = get_fmt_layer().with_filter(default_env_filter());

    registry().with(fmt_layer).init();
}
