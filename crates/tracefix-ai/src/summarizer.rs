//! Stage one: condense a raw stack trace with the local model.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::TracefixConfig;
use crate::failure::Summary;
use crate::ollama::OllamaClient;
use crate::pipeline::SummaryStage;
use crate::prompt;

/// Summarizer bound to a local model and endpoint.
#[derive(Debug, Clone)]
pub struct Summarizer {
    client: OllamaClient,
    timeout: Duration,
}

impl Summarizer {
    pub fn new(client: OllamaClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn from_config(config: &TracefixConfig) -> Self {
        Self::new(
            OllamaClient::with_config(&config.local_endpoint, &config.local_model),
            config.local_timeout,
        )
    }

    pub fn client(&self) -> &OllamaClient {
        &self.client
    }

    /// Condense `raw_log`. Makes exactly one request and never retries.
    pub async fn summarize(&self, raw_log: &str) -> Summary {
        let prompt = prompt::summarize_prompt(raw_log);
        debug!(
            model = %self.client.model(),
            log_bytes = raw_log.len(),
            prompt_bytes = prompt.len(),
            "summarizing log"
        );

        match self.client.generate(&prompt, self.timeout).await {
            Ok(text) => {
                info!(summary_bytes = text.len(), "log summarized");
                Summary::success(text)
            }
            Err(err) => {
                warn!(tag = %err.tag(), "summarizer failed: {}", err);
                Summary::from(err)
            }
        }
    }
}

#[async_trait]
impl SummaryStage for Summarizer {
    async fn summarize(&self, raw_log: &str) -> Summary {
        Summarizer::summarize(self, raw_log).await
    }
}

/// One-shot summarization against `endpoint` with `model`.
pub async fn summarize(raw_log: &str, model: &str, endpoint: &str, timeout: Duration) -> Summary {
    Summarizer::new(OllamaClient::with_config(endpoint, model), timeout)
        .summarize(raw_log)
        .await
}
