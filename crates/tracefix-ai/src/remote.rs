//! Client for an OpenAI-compatible chat completions API.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Credential, DEFAULT_REMOTE_BASE_URL};
use crate::failure::{ErrorCategory, StageError};
use crate::ollama::excerpt;

/// Chat completions client bound to one credential.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
}

/// Sampling and size settings for one completion.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Error response body, `{"error": {"message": ...}}`.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl ChatClient {
    /// Create a client for the default base URL.
    pub fn new(credential: &Credential) -> Result<Self, StageError> {
        Self::with_base_url(DEFAULT_REMOTE_BASE_URL, credential)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        credential: &Credential,
    ) -> Result<Self, StageError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", credential.expose()))
            .map_err(|_| remote(ErrorCategory::Credential, "API key contains invalid characters"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| remote(ErrorCategory::Transport, e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Send a single user message and return the reply text.
    pub async fn complete(
        &self,
        user_message: &str,
        options: &ChatOptions,
    ) -> Result<String, StageError> {
        let request = ChatCompletionRequest {
            model: &options.model,
            messages: vec![ChatMessage {
                role: "user",
                content: user_message,
            }],
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            stream: false,
        };

        let url = self.completions_url();
        debug!(url = %url, model = %options.model, "posting chat completion");

        let response = self
            .client
            .post(&url)
            .timeout(options.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport(e, &url))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| transport(e, &url))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| excerpt(&body));
            return Err(remote(
                ErrorCategory::Service,
                format!("API error {}: {}", status, message),
            ));
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&body).map_err(|e| {
            remote(
                ErrorCategory::Parse,
                format!("malformed response body ({})", e),
            )
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                StageError::ResponseUnparseable("reply carries no message content".to_string())
            })
    }
}

fn remote(category: ErrorCategory, detail: impl Into<String>) -> StageError {
    StageError::RemoteCall {
        category,
        detail: detail.into(),
    }
}

fn transport(err: reqwest::Error, url: &str) -> StageError {
    let detail = if err.is_timeout() {
        format!("request to {} timed out ({})", url, err)
    } else {
        format!("request to {} failed: {}", url, err)
    };
    remote(ErrorCategory::Transport, detail)
}
