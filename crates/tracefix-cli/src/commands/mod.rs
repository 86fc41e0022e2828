//! CLI commands.

pub mod check;
pub mod demo;
pub mod diagnose;
pub mod info;

use std::time::Duration;

use tracefix_ai::TracefixConfig;

use crate::Overrides;

/// Environment first, then command-line overrides on top.
pub(crate) fn resolve_config(overrides: &Overrides) -> TracefixConfig {
    apply_overrides(TracefixConfig::from_env(), overrides)
}

fn apply_overrides(config: TracefixConfig, overrides: &Overrides) -> TracefixConfig {
    let mut builder = config.into_builder();

    if let Some(model) = &overrides.local_model {
        builder = builder.local_model(model);
    }
    if let Some(endpoint) = &overrides.local_endpoint {
        builder = builder.local_endpoint(endpoint);
    }
    if let Some(secs) = overrides.local_timeout {
        builder = builder.local_timeout(Duration::from_secs(secs));
    }
    if let Some(model) = &overrides.remote_model {
        builder = builder.remote_model(model);
    }
    if let Some(url) = &overrides.remote_url {
        builder = builder.remote_base_url(url);
    }
    if let Some(secs) = overrides.remote_timeout {
        builder = builder.remote_timeout(Duration::from_secs(secs));
    }
    if let Some(key) = &overrides.api_key {
        builder = builder.api_key(key);
    }

    builder.build()
}
