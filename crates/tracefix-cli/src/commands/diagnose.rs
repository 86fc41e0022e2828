//! Diagnose command - summarize a log locally, then ask for a fix.

use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracefix_ai::{
    Diagnosis, DiagnosisRequest, Pipeline, PipelineEvent, Stage, TracefixConfig,
};

use super::resolve_config;
use crate::Overrides;

pub(crate) async fn run(
    code: &Path,
    log: &Path,
    json: bool,
    overrides: &Overrides,
) -> miette::Result<()> {
    if is_stdin(code) && is_stdin(log) {
        return Err(miette::miette!(
            "Only one of --code and --log can be read from stdin"
        ));
    }

    let user_code = read_input(code, "code")?;
    let raw_log = read_input(log, "log")?;

    let request = DiagnosisRequest::new(user_code, raw_log)
        .map_err(|e| miette::miette!("{}", e))?;

    let config = resolve_config(overrides);
    diagnose(&config, &request, json).await
}

/// Run the pipeline and print its outcome.
pub(crate) async fn diagnose(
    config: &TracefixConfig,
    request: &DiagnosisRequest,
    json: bool,
) -> miette::Result<()> {
    let pipeline = Pipeline::from_config(config);

    let diagnosis = if json {
        pipeline.diagnose(request).await
    } else {
        let spinner = spinner();
        let local_model = config.local_model.clone();
        let remote_model = config.remote_model.clone();
        let progress = spinner.clone();
        let diagnosis = pipeline
            .run(request, move |event| {
                report(&progress, event, &local_model, &remote_model)
            })
            .await;
        spinner.finish_and_clear();
        diagnosis
    };

    if json {
        let out = serde_json::to_string_pretty(&diagnosis)
            .map_err(|e| miette::miette!("Failed to encode result: {}", e))?;
        println!("{}", out);
    } else {
        render(&diagnosis);
    }

    match diagnosis.failure_text() {
        Some(failure) => Err(miette::miette!("{}", failure)),
        None => Ok(()),
    }
}

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .expect("Invalid progress bar template"),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn report(progress: &ProgressBar, event: PipelineEvent, local_model: &str, remote_model: &str) {
    match event {
        PipelineEvent::StageStarted(Stage::Summarize) => progress.set_message(format!(
            "[Step 1] Cleaning the log with local model {}...",
            local_model
        )),
        PipelineEvent::StageStarted(Stage::Advise) => progress.set_message(format!(
            "[Step 2] Asking remote model {} for a fix...",
            remote_model
        )),
        PipelineEvent::StageFinished {
            stage,
            elapsed,
            failed,
        } => {
            let label = match stage {
                Stage::Summarize => "Log cleaning",
                Stage::Advise => "Fix analysis",
            };
            let status = if failed { "failed" } else { "done" };
            progress.println(format!(
                "{} {} ({:.2}s)",
                label,
                status,
                elapsed.as_secs_f64()
            ));
        }
    }
}

fn render(diagnosis: &Diagnosis) {
    match diagnosis {
        Diagnosis::SummaryFailed { failure, .. } => {
            eprintln!("Log cleaning stopped: {}", failure);
        }
        Diagnosis::AdviceFailed {
            summary, failure, ..
        } => {
            print_summary(summary.as_str());
            eprintln!("Fix analysis stopped: {}", failure);
        }
        Diagnosis::Solved {
            summary, solution, ..
        } => {
            print_summary(summary.as_str());
            println!("Suggested fix");
            println!("=============");
            println!();
            println!("{}", solution);
        }
    }
}

fn print_summary(summary: &str) {
    println!("Key error information");
    println!("=====================");
    println!("{}", summary.trim_end());
    println!();
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn read_input(path: &Path, what: &str) -> miette::Result<String> {
    if is_stdin(path) {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| miette::miette!("Failed to read {} from stdin: {}", what, e))?;
        Ok(buf)
    } else {
        fs::read_to_string(path)
            .map_err(|e| miette::miette!("Failed to read {} file {}: {}", what, path.display(), e))
    }
}
