use std::path::PathBuf;

use crate::chain::StageId;

/// Stage error types
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// Reading a stage input failed for a reason other than absence
    #[error("IO error reading {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    /// Dependency file pattern does not compile
    #[error("Invalid dependency file pattern: {0}")]
    Pattern(String),

    /// Stage input could not be encoded
    #[error("Failed to encode stage input: {0}")]
    Encode(String),

    /// Stage id from another chain
    #[error("{0} not found in chain")]
    UnknownStage(StageId),

    /// Signature store unreadable or unwritable
    #[error("Signature store {0}: {1}")]
    Store(PathBuf, String),
}

pub type StageResult<T> = Result<T, StageError>;
