use anyhow::Result;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

static SUBSCRIBER_GUARD: OnceLock<()> = OnceLock::new();

const DEFAULT_DIRECTIVES: &str = "dietdash=info,dietdash_core=info";

/// Filter from `RUST_LOG`, or the crate-level defaults when unset.
pub fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Install the global tracing subscriber, writing compact lines to stderr so
/// stdout stays free for command output.
///
/// `None` uses [`default_filter`]. Idempotent, so tests and binaries may both
/// call it.
pub fn init_tracing(filter: Option<EnvFilter>) -> Result<()> {
    if SUBSCRIBER_GUARD.get().is_some() {
        return Ok(());
    }

    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr);
    let subscriber = Registry::default()
        .with(filter.unwrap_or_else(default_filter))
        .with(layer);
    tracing::subscriber::set_global_default(subscriber)?;
    SUBSCRIBER_GUARD.set(()).ok();

    Ok(())
}
