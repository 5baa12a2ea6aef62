//! Tracing setup for the store. Library code only emits spans and events;
//! binaries and tests opt in by calling [`init_logging`] once.

use crate::error::{Result, StoreError};
use tracing_subscriber::{fmt, EnvFilter};

/// Filter applied when the caller passes an empty string.
const DEFAULT_FILTER: &str = "tenebra=info";

/// Installs the global tracing subscriber with the given filter directive
/// (`EnvFilter` syntax, e.g. `tenebra=debug`). Fails if the directive does
/// not parse or a subscriber is already installed.
pub fn init_logging(level: &str) -> Result<()> {
    let directive = if level.is_empty() { DEFAULT_FILTER } else { level };
    let filter = EnvFilter::try_new(directive).map_err(|e| {
        StoreError::InvalidArgument(format!("invalid log filter {directive:?}: {e}"))
    })?;
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|_| StoreError::InvalidArgument("logging already initialized".into()))
}
