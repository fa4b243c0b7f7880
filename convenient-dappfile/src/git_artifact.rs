//! Git artifact descriptors
//!
//! A git artifact overlays files from a repository onto the image. Every
//! application has at most one local artifact (the repository holding the
//! Dappfile) and any number of remote ones.

use serde::{Deserialize, Serialize};

use crate::interlayer::Period;

/// Where and how an artifact lands in the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPlacement {
    /// Destination path inside the image
    pub where_to_add: String,
    /// Directory of the repository that is copied
    pub cwd: String,
    /// Restricts the copy to these paths
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paths: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Seconds before the archive layer is rebuilt
    pub interlayer_period: u64,
}

impl ArtifactPlacement {
    pub const DEFAULT_CWD: &'static str = "/";

    /// Placement with the default working directory and a one week
    /// interlayer period.
    pub fn new(where_to_add: impl Into<String>) -> Self {
        Self {
            where_to_add: where_to_add.into(),
            cwd: Self::DEFAULT_CWD.to_string(),
            paths: None,
            owner: None,
            group: None,
            interlayer_period: Period::Week.seconds(),
        }
    }
}

/// Artifact taken from the repository the Dappfile lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalGitArtifact {
    #[serde(flatten)]
    pub placement: ArtifactPlacement,
}

/// Artifact taken from another repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteGitArtifact {
    pub url: String,
    /// Repository name derived from `url`
    pub name: String,
    pub branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_key_path: Option<String>,
    #[serde(flatten)]
    pub placement: ArtifactPlacement,
}

impl RemoteGitArtifact {
    pub fn new(
        url: impl Into<String>,
        branch: impl Into<String>,
        ssh_key_path: Option<String>,
        placement: ArtifactPlacement,
    ) -> Self {
        let url = url.into();
        Self {
            name: repo_name(&url),
            url,
            branch: branch.into(),
            ssh_key_path,
            placement,
        }
    }
}

/// All git artifacts of one application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitArtifacts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalGitArtifact>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remote: Vec<RemoteGitArtifact>,
}

impl GitArtifacts {
    pub fn is_empty(&self) -> bool {
        self.local.is_none() && self.remote.is_empty()
    }
}

/// Extract the repository name from a clone URL.
///
/// Everything up to the last `/` (or `:` for scp-like URLs) is dropped, as is
/// a trailing `.git`.
///
/// ```
/// use convenient_dappfile::git_artifact::repo_name;
///
/// assert_eq!(repo_name("git@host:org/myrepo.git"), "myrepo");
/// assert_eq!(repo_name("https://host/org/my-repo.git"), "my-repo");
/// ```
pub fn repo_name(url: &str) -> String {
    let tail = url
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or(url);
    tail.strip_suffix(".git").unwrap_or(tail).to_string()
}
