//! Check command - verify the local model server and API key.

use tracefix_ai::{OllamaClient, OllamaError};

use super::resolve_config;
use crate::Overrides;

pub(crate) async fn run(overrides: &Overrides) -> miette::Result<()> {
    let config = resolve_config(overrides);
    let mut problems = 0;

    println!("Checking local model server: {}", config.local_endpoint);
    let client = OllamaClient::with_config(&config.local_endpoint, &config.local_model);
    match client.check_availability().await {
        Ok(()) => println!("  ok: model '{}' is available", config.local_model),
        Err(OllamaError::Http(e)) => {
            println!("  error: unexpected reply from server: {}", e);
            problems += 1;
        }
        Err(e) => {
            println!("  error: {}", e);
            problems += 1;
        }
    }

    println!();
    println!("Checking remote API key for {}", config.remote_base_url);
    match &config.credential {
        Some(credential) => println!("  ok: key configured ({})", credential.masked()),
        None => {
            println!("  error: no key; set DEEPSEEK_API_KEY, add it to .env, or pass --api-key");
            problems += 1;
        }
    }

    println!();
    if problems > 0 {
        println!("Check complete: {} problem(s)", problems);
        Err(miette::miette!("{} problem(s) found", problems))
    } else {
        println!("Check complete: ready to diagnose");
        Ok(())
    }
}
