//! Summarize-then-advise orchestration.
//!
//! ```text
//! raw log ──> SummaryStage ──(failure?)──> stop, report summary
//!                  │
//!                  └──(summary)──> AdviceStage ──> solution or failure
//! ```

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::advisor::Advisor;
use crate::config::TracefixConfig;
use crate::failure::{FailureTag, Solution, Summary};
use crate::summarizer::Summarizer;

/// Something that condenses a raw log.
#[async_trait]
pub trait SummaryStage: Send + Sync {
    async fn summarize(&self, raw_log: &str) -> Summary;
}

/// Something that proposes a fix from code and a summary.
#[async_trait]
pub trait AdviceStage: Send + Sync {
    async fn advise(&self, user_code: &str, summary: &Summary) -> Solution;
}

/// Rejected pipeline input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("no source code given; paste the relevant snippet")]
    MissingCode,
    #[error("no error log given; paste the full traceback")]
    MissingLog,
}

/// The two inputs of one diagnosis.
#[derive(Debug, Clone)]
pub struct DiagnosisRequest {
    user_code: String,
    raw_log: String,
}

impl DiagnosisRequest {
    /// Both inputs must contain something other than whitespace.
    pub fn new(user_code: impl Into<String>, raw_log: impl Into<String>) -> Result<Self, InputError> {
        let user_code = user_code.into();
        let raw_log = raw_log.into();

        if user_code.trim().is_empty() {
            return Err(InputError::MissingCode);
        }
        if raw_log.trim().is_empty() {
            return Err(InputError::MissingLog);
        }

        Ok(Self { user_code, raw_log })
    }

    pub fn user_code(&self) -> &str {
        &self.user_code
    }

    pub fn raw_log(&self) -> &str {
        &self.raw_log
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Summarize,
    Advise,
}

/// Progress notifications for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    StageStarted(Stage),
    StageFinished {
        stage: Stage,
        elapsed: Duration,
        failed: bool,
    },
}

/// Terminal result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Diagnosis {
    /// The summarizer failed; the advisor was not called.
    SummaryFailed {
        summary: Summary,
        failure: FailureTag,
        #[serde(with = "millis")]
        summary_elapsed: Duration,
    },
    /// The summary succeeded but the advisor failed.
    AdviceFailed {
        summary: Summary,
        solution: Solution,
        failure: FailureTag,
        #[serde(with = "millis")]
        summary_elapsed: Duration,
        #[serde(with = "millis")]
        advice_elapsed: Duration,
    },
    Solved {
        summary: Summary,
        solution: Solution,
        #[serde(with = "millis")]
        summary_elapsed: Duration,
        #[serde(with = "millis")]
        advice_elapsed: Duration,
    },
}

impl Diagnosis {
    pub fn summary(&self) -> &Summary {
        match self {
            Diagnosis::SummaryFailed { summary, .. }
            | Diagnosis::AdviceFailed { summary, .. }
            | Diagnosis::Solved { summary, .. } => summary,
        }
    }

    pub fn solution(&self) -> Option<&Solution> {
        match self {
            Diagnosis::SummaryFailed { .. } => None,
            Diagnosis::AdviceFailed { solution, .. } | Diagnosis::Solved { solution, .. } => {
                Some(solution)
            }
        }
    }

    pub fn is_solved(&self) -> bool {
        matches!(self, Diagnosis::Solved { .. })
    }

    /// The failure text to show the user, if the run ended in one.
    pub fn failure_text(&self) -> Option<&str> {
        match self {
            Diagnosis::SummaryFailed { summary, .. } => Some(summary.as_str()),
            Diagnosis::AdviceFailed { solution, .. } => Some(solution.as_str()),
            Diagnosis::Solved { .. } => None,
        }
    }
}

mod millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

/// Sequences the two stages.
pub struct Pipeline<S, A> {
    summarizer: S,
    advisor: A,
}

impl Pipeline<Summarizer, Advisor> {
    /// Build both stages from one configuration value.
    pub fn from_config(config: &TracefixConfig) -> Self {
        Self::new(Summarizer::from_config(config), Advisor::from_config(config))
    }
}

impl<S, A> Pipeline<S, A>
where
    S: SummaryStage,
    A: AdviceStage,
{
    pub fn new(summarizer: S, advisor: A) -> Self {
        Self {
            summarizer,
            advisor,
        }
    }

    /// Run without progress reporting.
    pub async fn diagnose(&self, request: &DiagnosisRequest) -> Diagnosis {
        self.run(request, |_| {}).await
    }

    /// Run the summarizer, then the advisor unless the summary is a failure.
    pub async fn run<F>(&self, request: &DiagnosisRequest, mut observer: F) -> Diagnosis
    where
        F: FnMut(PipelineEvent) + Send,
    {
        observer(PipelineEvent::StageStarted(Stage::Summarize));
        let started = Instant::now();
        let summary = self.summarizer.summarize(request.raw_log()).await;
        let summary_elapsed = started.elapsed();
        let summary_failure = summary.is_failure();
        observer(PipelineEvent::StageFinished {
            stage: Stage::Summarize,
            elapsed: summary_elapsed,
            failed: summary_failure,
        });

        if summary_failure {
            warn!("summary failed, advisor skipped");
            return Diagnosis::SummaryFailed {
                failure: tag_of(summary.as_str()),
                summary,
                summary_elapsed,
            };
        }
        info!(elapsed_ms = summary_elapsed.as_millis() as u64, "summary ready");

        observer(PipelineEvent::StageStarted(Stage::Advise));
        let started = Instant::now();
        let solution = self.advisor.advise(request.user_code(), &summary).await;
        let advice_elapsed = started.elapsed();
        let advice_failure = solution.is_failure();
        observer(PipelineEvent::StageFinished {
            stage: Stage::Advise,
            elapsed: advice_elapsed,
            failed: advice_failure,
        });

        if advice_failure {
            return Diagnosis::AdviceFailed {
                failure: tag_of(solution.as_str()),
                summary,
                solution,
                summary_elapsed,
                advice_elapsed,
            };
        }

        info!(elapsed_ms = advice_elapsed.as_millis() as u64, "diagnosis complete");
        Diagnosis::Solved {
            summary,
            solution,
            summary_elapsed,
            advice_elapsed,
        }
    }
}

/// Marked text from outside the known tags is reported as a local cleaning failure.
fn tag_of(text: &str) -> FailureTag {
    FailureTag::detect(text).unwrap_or(FailureTag::LocalCleaning)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::{StageError, FAILURE_MARKER};
    use crate::ollama::OllamaClient;
    use crate::remote::ChatOptions;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const LOG: &str = r#"Traceback (most recent call last):
  File "/usr/local/lib/python3.9/site-packages/pandas/core/indexes/base.py", line 3629, in get_loc
    return self._engine.get_loc(casted_key)
  File "pandas/_libs/index.pyx", line 136, in pandas._libs.index.IndexEngine.get_loc
  File "pandas/_libs/hashtable_class_helper.pxi", line 5198, in get_item
  File "/Users/student/homework/data_analysis.py", line 42, in calculate_avg
    result = df['score'] / df['weight']
  File "/usr/local/lib/python3.9/site-packages/pandas/core/frame.py", line 3807, in __getitem__
    indexer = self.columns.get_loc(key)
KeyError: 'weight'"#;

    const CODE: &str = "def calculate_avg(df): return df['score'] / df['weight']";

    struct FixedSummary(Summary);

    #[async_trait]
    impl SummaryStage for FixedSummary {
        async fn summarize(&self, _raw_log: &str) -> Summary {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct CountingAdvisor {
        calls: AtomicUsize,
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl AdviceStage for Arc<CountingAdvisor> {
        async fn advise(&self, user_code: &str, summary: &Summary) -> Solution {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((user_code.to_string(), summary.as_str().to_string()));
            Solution::success("```python\nfixed\n```")
        }
    }

    fn request() -> DiagnosisRequest {
        DiagnosisRequest::new(CODE, LOG).unwrap()
    }

    #[test]
    fn test_request_validation() {
        assert_eq!(
            DiagnosisRequest::new("  ", LOG).unwrap_err(),
            InputError::MissingCode
        );
        assert_eq!(
            DiagnosisRequest::new(CODE, "\n\t").unwrap_err(),
            InputError::MissingLog
        );
        assert!(DiagnosisRequest::new(CODE, LOG).is_ok());
    }

    #[tokio::test]
    async fn test_failed_summary_skips_advisor() {
        let advisor = Arc::new(CountingAdvisor::default());
        let failed = Summary::from(StageError::LocalConnection("connection refused".into()));
        let pipeline = Pipeline::new(FixedSummary(failed), Arc::clone(&advisor));

        let diagnosis = pipeline.diagnose(&request()).await;

        assert_eq!(advisor.calls.load(Ordering::SeqCst), 0);
        match &diagnosis {
            Diagnosis::SummaryFailed { failure, .. } => {
                assert_eq!(*failure, FailureTag::LocalConnection)
            }
            other => panic!("expected SummaryFailed, got {:?}", other),
        }
        assert!(diagnosis.solution().is_none());
        assert!(diagnosis.failure_text().unwrap().starts_with(FAILURE_MARKER));
    }

    #[tokio::test]
    async fn test_clean_summary_flows_into_advisor() {
        let advisor = Arc::new(CountingAdvisor::default());
        let pipeline = Pipeline::new(
            FixedSummary(Summary::from_text("KeyError: 'weight' at line 42")),
            Arc::clone(&advisor),
        );

        let diagnosis = pipeline.diagnose(&request()).await;

        assert!(diagnosis.is_solved());
        assert_eq!(advisor.calls.load(Ordering::SeqCst), 1);
        let seen = advisor.seen.lock().unwrap();
        assert_eq!(seen[0].0, CODE);
        assert_eq!(seen[0].1, "KeyError: 'weight' at line 42");
    }

    #[tokio::test]
    async fn test_observer_sees_both_stages_in_order() {
        let advisor = Arc::new(CountingAdvisor::default());
        let pipeline = Pipeline::new(FixedSummary(Summary::from_text("ok")), advisor);

        let mut events = Vec::new();
        pipeline.run(&request(), |event| events.push(event)).await;

        let stages: Vec<_> = events
            .iter()
            .map(|e| match e {
                PipelineEvent::StageStarted(stage) => ("start", *stage),
                PipelineEvent::StageFinished { stage, .. } => ("finish", *stage),
            })
            .collect();
        assert_eq!(
            stages,
            vec![
                ("start", Stage::Summarize),
                ("finish", Stage::Summarize),
                ("start", Stage::Advise),
                ("finish", Stage::Advise),
            ]
        );
    }

    #[tokio::test]
    async fn test_observer_stops_after_failed_summary() {
        let advisor = Arc::new(CountingAdvisor::default());
        let failed = Summary::from(StageError::MissingResponseField("response"));
        let pipeline = Pipeline::new(FixedSummary(failed), advisor);

        let mut events = Vec::new();
        pipeline.run(&request(), |event| events.push(event)).await;

        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[1],
            PipelineEvent::StageFinished {
                stage: Stage::Summarize,
                failed: true,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_end_to_end_with_mock_services() {
        let local = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": "Error type: KeyError\nUser code line: data_analysis.py line 42, result = df['score'] / df['weight']\nCore message: column 'weight' not found",
                "done": true
            })))
            .expect(1)
            .mount(&local)
            .await;
        let fix = "## Cause\nThe DataFrame has no `weight` column.\n\n```python\ndef calculate_avg(df):\n    if 'weight' not in df.columns:\n        return df['score'].mean()\n    return df['score'] / df['weight']\n```";
        let remote = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": fix}}]
            })))
            .expect(1)
            .mount(&remote)
            .await;

        let config = TracefixConfig::builder()
            .local_endpoint(local.uri())
            .remote_base_url(remote.uri())
            .api_key("sk-live")
            .build();
        let pipeline = Pipeline::from_config(&config);

        let diagnosis = pipeline.diagnose(&request()).await;

        assert!(diagnosis.is_solved(), "{:?}", diagnosis);
        assert!(diagnosis.summary().as_str().contains("KeyError"));
        assert!(diagnosis.summary().as_str().contains("weight"));
        assert_eq!(diagnosis.solution().unwrap().as_str(), fix);

        let requests = remote.received_requests().await.unwrap();
        let body: serde_json::Value = requests[0].body_json().unwrap();
        let remote_prompt = body["messages"][0]["content"].as_str().unwrap();
        assert!(remote_prompt.contains(CODE));
        assert!(remote_prompt.contains(diagnosis.summary().as_str()));
    }

    #[tokio::test]
    async fn test_local_timeout_never_reaches_advisor() {
        let local = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"response": "late"}))
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&local)
            .await;
        let remote = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .expect(0)
            .mount(&remote)
            .await;

        let pipeline = Pipeline::new(
            Summarizer::new(
                OllamaClient::with_config(local.uri(), "qwen2.5-coder:1.5b"),
                Duration::from_millis(200),
            ),
            Advisor::new(
                remote.uri(),
                crate::config::Credential::new("sk-live"),
                ChatOptions {
                    model: "deepseek-chat".into(),
                    max_tokens: 1000,
                    temperature: 0.3,
                    timeout: Duration::from_secs(5),
                },
            ),
        );

        let diagnosis = pipeline.diagnose(&request()).await;

        assert!(diagnosis
            .summary()
            .as_str()
            .starts_with("❌ local connection failure"));
        assert!(matches!(diagnosis, Diagnosis::SummaryFailed { .. }));
        assert!(remote.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_advice_failure_is_terminal() {
        let pipeline = Pipeline::new(
            FixedSummary(Summary::from_text("KeyError")),
            Advisor::new(
                "http://127.0.0.1:9",
                None,
                ChatOptions {
                    model: "deepseek-chat".into(),
                    max_tokens: 1000,
                    temperature: 0.3,
                    timeout: Duration::from_secs(1),
                },
            ),
        );

        let diagnosis = pipeline.diagnose(&request()).await;

        match &diagnosis {
            Diagnosis::AdviceFailed { failure, .. } => {
                assert_eq!(*failure, FailureTag::MissingCredential)
            }
            other => panic!("expected AdviceFailed, got {:?}", other),
        }
        assert!(!diagnosis.is_solved());
    }

    #[test]
    fn test_diagnosis_json_shape() {
        let diagnosis = Diagnosis::Solved {
            summary: Summary::from_text("KeyError"),
            solution: Solution::success("fix"),
            summary_elapsed: Duration::from_millis(1500),
            advice_elapsed: Duration::from_millis(250),
        };
        let json = serde_json::to_value(&diagnosis).unwrap();
        assert_eq!(json["outcome"], "solved");
        assert_eq!(json["summary"], "KeyError");
        assert_eq!(json["solution"], "fix");
        assert_eq!(json["summary_elapsed"], 1500);
        assert_eq!(json["advice_elapsed"], 250);
    }
}
