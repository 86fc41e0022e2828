//! Prompt templates for the two stages.
//!
//! Both templates embed caller text verbatim; nothing is trimmed or escaped.

/// Build the log-cleaning prompt for the local model.
pub fn summarize_prompt(raw_log: &str) -> String {
    format!(
        r#"You are an error log cleaning tool. From the noisy log below, extract:
1. Error type
2. The line of user code that caused the error
3. Core error message

Ignore all stack frames from system libraries and frameworks.
Answer with a plain-text summary only. Do not use Markdown.

Log content:
{raw_log}
"#
    )
}

/// Build the fix request for the remote model.
pub fn advise_prompt(user_code: &str, summary: &str) -> String {
    format!(
        r#"I ran into an error. Please help me fix it.

[My code]:
{user_code}

[Key error information] (extracted by the local assistant):
{summary}

Analyze the root cause and give the corrected version of the code. Format the answer as Markdown.
"#
    )
}
