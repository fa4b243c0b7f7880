//! Source-control lookups used while resolving Dappfiles.
//!
//! The interpreter only needs one thing from git: the branch the project
//! directory currently has checked out, which becomes the default branch of
//! remote git artifacts.

use std::path::{Path, PathBuf};

use git2::{ErrorCode, Repository};
use tracing::debug;

/// Git repository errors
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Repository not found at {0}")]
    NotFound(PathBuf),

    #[error("Repository at {0} has no commits yet")]
    UnbornHead(PathBuf),
}

pub type GitResult<T> = Result<T, GitError>;

/// Answers questions about the repository a Dappfile lives in.
pub trait SourceControl {
    /// Name of the checked out branch, `HEAD` when detached.
    fn current_branch(&self, path: &Path) -> GitResult<String>;
}

/// [`SourceControl`] backed by libgit2.
#[derive(Debug, Default, Clone, Copy)]
pub struct Git2SourceControl;

impl SourceControl for Git2SourceControl {
    fn current_branch(&self, path: &Path) -> GitResult<String> {
        let repo = match Repository::discover(path) {
            Ok(repo) => repo,
            Err(e) if e.code() == ErrorCode::NotFound => {
                return Err(GitError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let head = match repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == ErrorCode::UnbornBranch => {
                return Err(GitError::UnbornHead(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        // Matches `git rev-parse --abbrev-ref HEAD`
        let branch = if head.is_branch() {
            head.shorthand().unwrap_or("HEAD").to_string()
        } else {
            "HEAD".to_string()
        };

        debug!("Current branch of {}: {}", path.display(), branch);
        Ok(branch)
    }
}

/// [`SourceControl`] that always reports the same branch.
///
/// Handy when the branch is known up front (CI checkouts) and in tests.
#[derive(Debug, Clone)]
pub struct StaticBranch(pub String);

impl SourceControl for StaticBranch {
    fn current_branch(&self, _path: &Path) -> GitResult<String> {
        Ok(self.0.clone())
    }
}
