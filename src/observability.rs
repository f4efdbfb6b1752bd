//! Observability
//!
//! Tracing setup for hosts embedding the pipeline. Safe to call more than
//! once; only the first call installs the subscriber.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a formatted tracing subscriber. Filter comes from `RUST_LOG`,
/// defaulting to `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
