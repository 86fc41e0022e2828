//! # Tracefix AI pipeline
//!
//! Two-stage error diagnosis: a small local model condenses a noisy stack
//! trace, then a larger remote model proposes a fix from that summary and
//! the user's code.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │  Raw log    │ --> │   Summarizer    │ --> │     Advisor      │ --> Solution
//! │  + code     │     │ (Ollama, local) │     │ (chat API, cloud)│
//! └─────────────┘     └─────────────────┘     └──────────────────┘
//! ```
//!
//! Failures are data: each stage returns text, and failed text starts with
//! [`FAILURE_MARKER`] followed by a [`FailureTag`]. The [`Pipeline`] never
//! calls the advisor after a failed summary.
//!
//! ## Usage
//!
//! ```ignore
//! use tracefix_ai::{DiagnosisRequest, Pipeline, TracefixConfig};
//!
//! let config = TracefixConfig::from_env();
//! let pipeline = Pipeline::from_config(&config);
//! let request = DiagnosisRequest::new(code, log)?;
//!
//! let diagnosis = pipeline.diagnose(&request).await;
//! ```

mod advisor;
mod config;
mod failure;
mod ollama;
mod pipeline;
mod prompt;
mod remote;
mod summarizer;

#[cfg(test)]
mod testing;

pub use advisor::{advise, Advisor};
pub use config::{
    Credential, TracefixConfig, TracefixConfigBuilder, DEFAULT_LOCAL_ENDPOINT,
    DEFAULT_LOCAL_MODEL, DEFAULT_LOCAL_PORT, DEFAULT_LOCAL_TIMEOUT, DEFAULT_MAX_OUTPUT_TOKENS,
    DEFAULT_REMOTE_BASE_URL, DEFAULT_REMOTE_MODEL, DEFAULT_REMOTE_TIMEOUT, DEFAULT_TEMPERATURE,
};
pub use failure::{ErrorCategory, FailureTag, Solution, StageError, Summary, FAILURE_MARKER};
pub use ollama::{OllamaClient, OllamaError};
pub use pipeline::{
    AdviceStage, Diagnosis, DiagnosisRequest, InputError, Pipeline, PipelineEvent, Stage,
    SummaryStage,
};
pub use prompt::{advise_prompt, summarize_prompt};
pub use remote::{ChatClient, ChatOptions};
pub use summarizer::{summarize, Summarizer};
