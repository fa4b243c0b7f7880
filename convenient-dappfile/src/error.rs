//! Error types for Dappfile interpretation

use std::path::PathBuf;

use convenient_git::GitError;

use crate::settings::AppType;

/// A directive used where it is not allowed, or used wrongly.
///
/// Fatal for the application branch it occurs in.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Install/setup instruction on an application that is not of type shell
    #[error("instruction '{directive}' only supported for 'shell' type")]
    TypeMismatch {
        directive: String,
        app_type: Option<AppType>,
    },

    /// Directive name not in the vocabulary
    #[error("unknown directive '{0}'")]
    UnknownDirective(String),

    /// Directive arguments of the wrong shape
    #[error("invalid arguments for '{directive}': {reason}")]
    InvalidArguments { directive: String, reason: String },

    /// Entry that is neither a bare name nor a single-key mapping
    #[error("malformed directive: {0}")]
    MalformedDirective(String),
}

impl ConfigError {
    pub(crate) fn invalid(directive: &str, reason: impl ToString) -> Self {
        ConfigError::InvalidArguments {
            directive: directive.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Application branch that was abandoned because of a [`ConfigError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("application '{app}': {error}")]
pub struct BranchFailure {
    pub app: String,
    pub error: ConfigError,
}

/// Dappfile error types
#[derive(Debug, thiserror::Error)]
pub enum DappfileError {
    /// File system I/O error
    #[error("IO error reading {0}: {1}")]
    IoError(PathBuf, String),

    /// YAML parsing error
    #[error("Parse error in {0}: {1}")]
    ParseError(PathBuf, String),

    /// Source control lookup failed
    #[error("Source control error for {0}: {1}")]
    SourceControl(PathBuf, #[source] GitError),

    /// Application name pattern is not a valid glob
    #[error("Invalid application pattern '{0}': {1}")]
    InvalidPattern(String, String),

    /// One or more application branches failed
    #[error("{} application(s) failed: {}", .0.len(), summarize(.0))]
    BranchesFailed(Vec<BranchFailure>),
}

fn summarize(failures: &[BranchFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, DappfileError>;
