//! Stage two: ask the remote model for a fix.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::{Credential, TracefixConfig, DEFAULT_REMOTE_BASE_URL};
use crate::failure::{Solution, StageError, Summary};
use crate::pipeline::AdviceStage;
use crate::prompt;
use crate::remote::{ChatClient, ChatOptions};

/// Advisor bound to a remote model.
#[derive(Debug, Clone)]
pub struct Advisor {
    base_url: String,
    credential: Option<Credential>,
    options: ChatOptions,
}

impl Advisor {
    pub fn new(
        base_url: impl Into<String>,
        credential: Option<Credential>,
        options: ChatOptions,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            credential,
            options,
        }
    }

    pub fn from_config(config: &TracefixConfig) -> Self {
        Self::new(
            &config.remote_base_url,
            config.credential.clone(),
            ChatOptions {
                model: config.remote_model.clone(),
                max_tokens: config.max_output_tokens,
                temperature: config.temperature,
                timeout: config.remote_timeout,
            },
        )
    }

    pub fn options(&self) -> &ChatOptions {
        &self.options
    }

    /// Propose a fix for `user_code` given the summarizer's output.
    ///
    /// The summary is used as-is; deciding whether it is worth sending is the
    /// caller's job. Without a credential this returns at once with no request.
    pub async fn advise(&self, user_code: &str, summary: &Summary) -> Solution {
        match self.try_advise(user_code, summary).await {
            Ok(text) => {
                info!(solution_bytes = text.len(), "fix proposed");
                Solution::success(text)
            }
            Err(err) => {
                warn!(tag = %err.tag(), "advisor failed: {}", err);
                Solution::from(err)
            }
        }
    }

    async fn try_advise(&self, user_code: &str, summary: &Summary) -> Result<String, StageError> {
        let credential = self
            .credential
            .as_ref()
            .ok_or(StageError::MissingCredential)?;

        let prompt = prompt::advise_prompt(user_code, summary.as_str());
        debug!(
            model = %self.options.model,
            prompt_bytes = prompt.len(),
            "requesting fix"
        );

        let client = ChatClient::with_base_url(&self.base_url, credential)?;
        client.complete(&prompt, &self.options).await
    }
}

#[async_trait]
impl AdviceStage for Advisor {
    async fn advise(&self, user_code: &str, summary: &Summary) -> Solution {
        Advisor::advise(self, user_code, summary).await
    }
}

/// One-shot advice from the default remote service.
pub async fn advise(
    user_code: &str,
    summary: &Summary,
    credential: Option<Credential>,
    model: &str,
    timeout: Duration,
) -> Solution {
    let defaults = TracefixConfig::default();
    Advisor::new(
        DEFAULT_REMOTE_BASE_URL,
        credential,
        ChatOptions {
            model: model.to_string(),
            max_tokens: defaults.max_output_tokens,
            temperature: defaults.temperature,
            timeout,
        },
    )
    .advise(user_code, summary)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::{FailureTag, FAILURE_MARKER};
    use crate::testing::unused_address;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CODE: &str = "def calculate_avg(df): return df['score'] / df['weight']";
    const FIX: &str = "The column `weight` is missing.\n\n```python\ndef calculate_avg(df):\n    if 'weight' not in df.columns:\n        raise ValueError('missing weight column')\n    return df['score'] / df['weight']\n```";

    fn reply_with(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        }))
    }

    async fn chat_replying(template: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(template)
            .mount(&server)
            .await;
        server
    }

    fn advisor_for(url: String, credential: Option<Credential>) -> Advisor {
        let config = TracefixConfig::builder()
            .remote_base_url(url)
            .credential(credential)
            .remote_timeout(Duration::from_secs(5))
            .build();
        Advisor::from_config(&config)
    }

    fn summary() -> Summary {
        Summary::from_text("Error type: KeyError\nLine: data_analysis.py:42\nMessage: 'weight'")
    }

    #[tokio::test]
    async fn test_missing_credential_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply_with(FIX))
            .expect(0)
            .mount(&server)
            .await;
        let advisor = advisor_for(server.uri(), None);

        let solution = advisor.advise(CODE, &summary()).await;

        assert_eq!(solution.failure_tag(), Some(FailureTag::MissingCredential));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_free_function_fast_fails_without_credential() {
        let solution = advise(CODE, &summary(), None, "deepseek-chat", Duration::from_secs(1)).await;
        assert_eq!(solution.failure_tag(), Some(FailureTag::MissingCredential));
    }

    #[tokio::test]
    async fn test_success_returns_markdown() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-live"))
            .respond_with(reply_with(FIX))
            .expect(1)
            .mount(&server)
            .await;
        let advisor = advisor_for(server.uri(), Credential::new("sk-live"));

        let solution = advisor.advise(CODE, &summary()).await;

        assert!(!solution.is_failure());
        assert_eq!(solution.as_str(), FIX);
        assert!(solution.as_str().contains("```python\ndef calculate_avg(df):"));
    }

    #[tokio::test]
    async fn test_prompt_carries_code_and_summary() {
        let server = chat_replying(reply_with(FIX)).await;
        let advisor = advisor_for(server.uri(), Credential::new("sk-live"));

        advisor.advise(CODE, &summary()).await;

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = requests[0].body_json().unwrap();
        let prompt = body["messages"][0]["content"].as_str().unwrap();
        assert!(prompt.contains(CODE));
        assert!(prompt.contains(summary().as_str()));
        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["max_tokens"], 1000);
    }

    #[tokio::test]
    async fn test_transport_failure_is_tagged_with_detail() {
        let endpoint = unused_address();
        let advisor = advisor_for(endpoint.clone(), Credential::new("sk-live"));

        let solution = advisor.advise(CODE, &summary()).await;

        assert!(solution.as_str().starts_with(FAILURE_MARKER));
        assert_eq!(solution.failure_tag(), Some(FailureTag::RemoteCall));
        assert!(
            solution.as_str().contains(&format!("{}/chat/completions", endpoint)),
            "{}",
            solution
        );
        assert!(solution.as_str().contains("failed"), "{}", solution);
    }

    #[tokio::test]
    async fn test_quota_error_is_remote_failure() {
        let server = chat_replying(ResponseTemplate::new(402).set_body_json(json!({
            "error": {"message": "Insufficient Balance"}
        })))
        .await;
        let advisor = advisor_for(server.uri(), Credential::new("sk-live"));

        let solution = advisor.advise(CODE, &summary()).await;
        assert_eq!(solution.failure_tag(), Some(FailureTag::RemoteCall));
        assert!(solution.as_str().contains("Insufficient Balance"));
    }

    #[tokio::test]
    async fn test_empty_reply_is_unparseable() {
        let server = chat_replying(reply_with("   ")).await;
        let advisor = advisor_for(server.uri(), Credential::new("sk-live"));

        let solution = advisor.advise(CODE, &summary()).await;
        assert_eq!(solution.failure_tag(), Some(FailureTag::ResponseUnparseable));
    }

    #[test]
    fn test_from_config_options() {
        let config = TracefixConfig::builder()
            .remote_model("gpt-4.1-mini")
            .max_output_tokens(800)
            .remote_timeout(Duration::from_secs(9))
            .build();
        let advisor = Advisor::from_config(&config);
        assert_eq!(advisor.options().model, "gpt-4.1-mini");
        assert_eq!(advisor.options().max_tokens, 800);
        assert_eq!(advisor.options().timeout, Duration::from_secs(9));
        assert!((advisor.options().temperature - 0.3).abs() < f32::EPSILON);
    }
}
