//! Failure markers and the stage result types.
//!
//! Both stages report errors as data: a [`Summary`] or [`Solution`] is either
//! the model's text or a failure string of the form `❌ <tag>: <detail>`.
//! Internally the stages work with [`StageError`] and convert it to text at
//! their boundary, so no error value ever leaves a stage.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Leading glyph of every failure string.
pub const FAILURE_MARKER: &str = "❌";

/// Broad class of a stage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Connectivity or timeout talking to a service.
    Transport,
    /// Non-success status or unexpected payload from a service.
    Service,
    /// No usable authentication material.
    Credential,
    /// Response body present but not in the expected shape.
    Parse,
}

/// The documented failure tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureTag {
    LocalConnection,
    LocalCleaning,
    ResponseNotParseable,
    MissingResponseField,
    MissingCredential,
    RemoteCall,
    ResponseUnparseable,
}

impl FailureTag {
    pub const ALL: [FailureTag; 7] = [
        FailureTag::LocalConnection,
        FailureTag::LocalCleaning,
        FailureTag::ResponseNotParseable,
        FailureTag::MissingResponseField,
        FailureTag::MissingCredential,
        FailureTag::RemoteCall,
        FailureTag::ResponseUnparseable,
    ];

    /// Text of the tag as it appears after the marker.
    pub const fn as_str(self) -> &'static str {
        match self {
            FailureTag::LocalConnection => "local connection failure",
            FailureTag::LocalCleaning => "local cleaning failure",
            FailureTag::ResponseNotParseable => "response not parseable",
            FailureTag::MissingResponseField => "missing response field",
            FailureTag::MissingCredential => "missing credential",
            FailureTag::RemoteCall => "remote call failure",
            FailureTag::ResponseUnparseable => "response unparseable",
        }
    }

    /// Recover the tag from a failure string.
    ///
    /// Returns `None` for text that does not begin with [`FAILURE_MARKER`].
    pub fn detect(text: &str) -> Option<Self> {
        let rest = text.strip_prefix(FAILURE_MARKER)?.trim_start();
        Self::ALL
            .into_iter()
            .find(|tag| rest.starts_with(tag.as_str()))
    }
}

impl fmt::Display for FailureTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised inside a stage before it is converted to a failure string.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("local connection failure: {0}")]
    LocalConnection(String),
    #[error("local cleaning failure: {0}")]
    LocalCleaning(String),
    #[error("response not parseable: {0}")]
    ResponseNotParseable(String),
    #[error("missing response field: reply has no `{0}` text")]
    MissingResponseField(&'static str),
    #[error("missing credential: no API key configured for the remote service")]
    MissingCredential,
    #[error("remote call failure: {detail}")]
    RemoteCall {
        category: ErrorCategory,
        detail: String,
    },
    #[error("response unparseable: {0}")]
    ResponseUnparseable(String),
}

impl StageError {
    pub fn tag(&self) -> FailureTag {
        match self {
            StageError::LocalConnection(_) => FailureTag::LocalConnection,
            StageError::LocalCleaning(_) => FailureTag::LocalCleaning,
            StageError::ResponseNotParseable(_) => FailureTag::ResponseNotParseable,
            StageError::MissingResponseField(_) => FailureTag::MissingResponseField,
            StageError::MissingCredential => FailureTag::MissingCredential,
            StageError::RemoteCall { .. } => FailureTag::RemoteCall,
            StageError::ResponseUnparseable(_) => FailureTag::ResponseUnparseable,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            StageError::LocalConnection(_) => ErrorCategory::Transport,
            StageError::LocalCleaning(_) => ErrorCategory::Service,
            StageError::ResponseNotParseable(_)
            | StageError::MissingResponseField(_)
            | StageError::ResponseUnparseable(_) => ErrorCategory::Parse,
            StageError::MissingCredential => ErrorCategory::Credential,
            StageError::RemoteCall { category, .. } => *category,
        }
    }

    /// Render as a marked failure string.
    pub fn into_text(self) -> String {
        format!("{} {}", FAILURE_MARKER, self)
    }
}

macro_rules! stage_text {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub(crate) fn success(text: impl Into<String>) -> Self {
                Self(text.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }

            /// Whether this text carries the failure marker.
            pub fn is_failure(&self) -> bool {
                self.0.starts_with(FAILURE_MARKER)
            }

            pub fn failure_tag(&self) -> Option<FailureTag> {
                FailureTag::detect(&self.0)
            }
        }

        impl From<StageError> for $name {
            fn from(err: StageError) -> Self {
                Self(err.into_text())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

stage_text!(
    /// Output of the summarizer: a condensed diagnosis or a failure string.
    Summary
);

stage_text!(
    /// Output of the advisor: markdown analysis and fix, or a failure string.
    Solution
);

impl Summary {
    /// Wrap caller-supplied text, e.g. a summary produced elsewhere.
    ///
    /// Text that starts with the marker is still treated as a failure.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}
