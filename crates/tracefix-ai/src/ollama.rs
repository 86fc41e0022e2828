//! Ollama API client for the local summarizer model.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{DEFAULT_LOCAL_ENDPOINT, DEFAULT_LOCAL_MODEL};
use crate::failure::StageError;

/// Longest slice of an error body carried into a failure string.
const BODY_EXCERPT_LEN: usize = 200;

/// Ollama API client.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

/// Errors from the availability check.
#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Ollama server not running at {0}. Start it with: ollama serve")]
    ServerNotRunning(String),
    #[error("Model '{0}' not found. Pull it with: ollama pull {0}")]
    ModelNotFound(String),
}

/// Request to Ollama generate API.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Response from Ollama tags API (list models).
#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

impl OllamaClient {
    /// Create a new Ollama client with default settings.
    pub fn new() -> Self {
        Self::with_config(DEFAULT_LOCAL_ENDPOINT, DEFAULT_LOCAL_MODEL)
    }

    /// Create a new Ollama client with custom URL and model.
    pub fn with_config(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the base URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Get the current model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    /// Send one non-streaming prompt and return the `response` text.
    pub async fn generate(&self, prompt: &str, timeout: Duration) -> Result<String, StageError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let url = self.generate_url();
        debug!(url = %url, model = %self.model, "posting generate request");

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| StageError::LocalConnection(describe_transport(&e, &self.base_url)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StageError::LocalConnection(describe_transport(&e, &self.base_url)))?;

        if !status.is_success() {
            return Err(StageError::LocalCleaning(format!(
                "{}: {}",
                status,
                excerpt(&body)
            )));
        }

        let payload: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| StageError::ResponseNotParseable(format!("body is not JSON ({})", e)))?;

        if !payload.is_object() {
            return Err(StageError::ResponseNotParseable(
                "body is not a JSON object".to_string(),
            ));
        }

        payload
            .get("response")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or(StageError::MissingResponseField("response"))
    }

    /// Check if Ollama server is running and model is available.
    pub async fn check_availability(&self) -> Result<(), OllamaError> {
        let tags_url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&tags_url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|_| OllamaError::ServerNotRunning(self.base_url.clone()))?;

        if !response.status().is_success() {
            return Err(OllamaError::ServerNotRunning(self.base_url.clone()));
        }

        let tags: TagsResponse = response.json().await?;
        if model_installed(&tags, &self.model) {
            Ok(())
        } else {
            Err(OllamaError::ModelNotFound(self.model.clone()))
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

/// An untagged model name matches any installed tag of the same base.
fn model_installed(tags: &TagsResponse, model: &str) -> bool {
    let model_base = model.split(':').next().unwrap_or(model);
    let untagged = !model.contains(':');

    tags.models.iter().any(|m| {
        m.name == model
            || (untagged && m.name.starts_with(&format!("{}:", model_base)))
    })
}

fn describe_transport(err: &reqwest::Error, base_url: &str) -> String {
    if err.is_timeout() {
        format!("request to {} timed out ({})", base_url, err)
    } else if err.is_connect() {
        format!(
            "cannot reach {} (is Ollama running? start it with `ollama serve`): {}",
            base_url, err
        )
    } else {
        err.to_string()
    }
}

pub(crate) fn excerpt(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((cut, _)) => format!("{}…", &body[..cut]),
        None => body.to_string(),
    }
}
