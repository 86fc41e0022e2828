//! Pipeline configuration.

use std::fmt;
use std::time::Duration;

/// Default local model for log cleaning.
pub const DEFAULT_LOCAL_MODEL: &str = "qwen2.5-coder:1.5b";

/// Default Ollama server address.
pub const DEFAULT_LOCAL_ENDPOINT: &str = "http://localhost:11434";

/// Port Ollama listens on when a bare host is given.
pub const DEFAULT_LOCAL_PORT: u16 = 11434;

/// Default remote chat model.
pub const DEFAULT_REMOTE_MODEL: &str = "deepseek-chat";

/// Default base URL of the remote chat completions API.
pub const DEFAULT_REMOTE_BASE_URL: &str = "https://api.deepseek.com";

pub const DEFAULT_LOCAL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1000;

/// Low temperature so repeated runs propose the same fix.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// API key for the remote service.
///
/// Never printed: `Debug` is redacted and there is no `Display`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for blank material, which is not a usable credential.
    pub fn new(secret: impl Into<String>) -> Option<Self> {
        let secret = secret.into();
        let trimmed = secret.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Masked form for display, e.g. `sk-1…89ab`.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 8 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}…{}", head, tail)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Configuration for both pipeline stages.
#[derive(Debug, Clone)]
pub struct TracefixConfig {
    /// Lightweight model requested from the local service
    pub local_model: String,
    /// Address of the local service (without the `/api/generate` path)
    pub local_endpoint: String,
    pub local_timeout: Duration,
    /// Model requested from the remote service
    pub remote_model: String,
    /// Base URL of the remote chat completions API
    pub remote_base_url: String,
    pub remote_timeout: Duration,
    /// Upper bound on generated tokens for the advisor
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub credential: Option<Credential>,
}

impl Default for TracefixConfig {
    fn default() -> Self {
        Self {
            local_model: DEFAULT_LOCAL_MODEL.to_string(),
            local_endpoint: DEFAULT_LOCAL_ENDPOINT.to_string(),
            local_timeout: DEFAULT_LOCAL_TIMEOUT,
            remote_model: DEFAULT_REMOTE_MODEL.to_string(),
            remote_base_url: DEFAULT_REMOTE_BASE_URL.to_string(),
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            credential: None,
        }
    }
}

impl TracefixConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let local_model = non_empty("TRACEFIX_LOCAL_MODEL").unwrap_or(defaults.local_model);

        let local_endpoint = non_empty("TRACEFIX_LOCAL_ENDPOINT")
            .or_else(|| non_empty("OLLAMA_HOST"))
            .map(|v| normalize_endpoint(&v))
            .unwrap_or(defaults.local_endpoint);

        let local_timeout = non_empty("TRACEFIX_LOCAL_TIMEOUT")
            .and_then(|v| parse_seconds(&v))
            .unwrap_or(defaults.local_timeout);

        let remote_model = non_empty("TRACEFIX_REMOTE_MODEL").unwrap_or(defaults.remote_model);

        let remote_base_url = non_empty("TRACEFIX_REMOTE_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or(defaults.remote_base_url);

        let remote_timeout = non_empty("TRACEFIX_REMOTE_TIMEOUT")
            .and_then(|v| parse_seconds(&v))
            .unwrap_or(defaults.remote_timeout);

        let credential = lookup("DEEPSEEK_API_KEY")
            .and_then(Credential::new)
            .or_else(|| lookup("OPENAI_API_KEY").and_then(Credential::new));

        Self {
            local_model,
            local_endpoint,
            local_timeout,
            remote_model,
            remote_base_url,
            remote_timeout,
            credential,
            ..defaults
        }
    }

    /// Whether the advisor has a credential to work with.
    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// Create a builder for configuration.
    pub fn builder() -> TracefixConfigBuilder {
        TracefixConfigBuilder::default()
    }

    /// Continue building from this configuration.
    pub fn into_builder(self) -> TracefixConfigBuilder {
        TracefixConfigBuilder { config: self }
    }
}

/// Accepts `host`, `host:port` and full URLs, the way `OLLAMA_HOST` is set.
///
/// A bare host without scheme or port gets Ollama's port, not port 80.
fn normalize_endpoint(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return trimmed.to_string();
    }

    let (authority, path) = match trimmed.find('/') {
        Some(idx) => trimmed.split_at(idx),
        None => (trimmed, ""),
    };

    if has_port(authority) {
        format!("http://{}", trimmed)
    } else {
        format!("http://{}:{}{}", authority, DEFAULT_LOCAL_PORT, path)
    }
}

/// `[::1]:11434` has a port, `[::1]` and `localhost` do not.
fn has_port(authority: &str) -> bool {
    match authority.rfind(']') {
        Some(end) => authority[end + 1..].starts_with(':'),
        None => authority.contains(':'),
    }
}

fn parse_seconds(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(Duration::from_secs_f64)
}

/// Builder for pipeline configuration.
#[derive(Debug, Default)]
pub struct TracefixConfigBuilder {
    config: TracefixConfig,
}

impl TracefixConfigBuilder {
    pub fn local_model(mut self, model: impl Into<String>) -> Self {
        self.config.local_model = model.into();
        self
    }

    pub fn local_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.local_endpoint = normalize_endpoint(&endpoint.into());
        self
    }

    pub fn local_timeout(mut self, timeout: Duration) -> Self {
        self.config.local_timeout = timeout;
        self
    }

    pub fn remote_model(mut self, model: impl Into<String>) -> Self {
        self.config.remote_model = model.into();
        self
    }

    pub fn remote_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn remote_timeout(mut self, timeout: Duration) -> Self {
        self.config.remote_timeout = timeout;
        self
    }

    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.config.max_output_tokens = tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Blank keys are ignored; an already configured credential is kept.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        if let Some(credential) = Credential::new(key) {
            self.config.credential = Some(credential);
        }
        self
    }

    pub fn credential(mut self, credential: Option<Credential>) -> Self {
        self.config.credential = credential;
        self
    }

    pub fn build(self) -> TracefixConfig {
        self.config
    }
}
