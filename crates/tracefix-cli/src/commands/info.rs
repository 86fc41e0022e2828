//! Info command - show the effective configuration.

use super::resolve_config;
use crate::Overrides;

pub(crate) fn run(overrides: &Overrides) -> miette::Result<()> {
    let config = resolve_config(overrides);

    println!("Tracefix {}", env!("CARGO_PKG_VERSION"));
    println!("===============");
    println!();

    println!("Stage 1 - log cleaning (local):");
    println!("  Endpoint: {}", config.local_endpoint);
    println!("  Model:    {}", config.local_model);
    println!("  Timeout:  {}s", config.local_timeout.as_secs_f64());
    println!();

    println!("Stage 2 - fix analysis (remote):");
    println!("  API:         {}", config.remote_base_url);
    println!("  Model:       {}", config.remote_model);
    println!("  Timeout:     {}s", config.remote_timeout.as_secs_f64());
    println!("  Max tokens:  {}", config.max_output_tokens);
    println!("  Temperature: {}", config.temperature);
    println!(
        "  API key:     {}",
        config
            .credential
            .as_ref()
            .map(|c| c.masked())
            .unwrap_or_else(|| "not set".to_string())
    );

    Ok(())
}
