//! Concrete stage kinds
//!
//! Each kind only decides which inputs it contributes; chaining and hashing
//! live in [`crate::chain`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use convenient_dappfile::GitArtifacts;
use glob::{Pattern, glob};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::chain::{StageInput, StageInputs};
use crate::error::{StageError, StageResult};

/// Files whose contents decide whether dependencies must be reinstalled.
pub const DEPENDENCY_FILE_PATTERN: &str = r".*/(Gemfile|composer.json|requirement_file.txt)$";

/// Base image the chain starts from.
#[derive(Debug, Clone)]
pub struct FromStage {
    image: Option<String>,
}

impl FromStage {
    pub fn new(image: Option<&str>) -> Self {
        Self {
            image: image.map(str::to_string),
        }
    }
}

impl StageInputs for FromStage {
    fn dependency_inputs(&self) -> StageResult<Vec<StageInput>> {
        Ok(vec![self.image.clone().into()])
    }
}

/// Stage driven by one list of shell instructions.
#[derive(Debug, Clone)]
pub struct InstructionsStage {
    label: &'static str,
    instructions: Vec<String>,
}

impl InstructionsStage {
    pub fn new(label: &'static str, instructions: &[String]) -> Self {
        Self {
            label,
            instructions: instructions.to_vec(),
        }
    }
}

impl StageInputs for InstructionsStage {
    fn dependency_inputs(&self) -> StageResult<Vec<StageInput>> {
        let mut inputs: Vec<StageInput> = Vec::with_capacity(self.instructions.len() + 1);
        inputs.push(self.label.into());
        inputs.extend(self.instructions.iter().map(|i| StageInput::from(i.as_str())));
        Ok(inputs)
    }
}

/// Stage that adds the application's git artifacts.
#[derive(Debug, Clone)]
pub struct GitArtifactStage {
    label: &'static str,
    artifacts: GitArtifacts,
}

impl GitArtifactStage {
    pub fn new(label: &'static str, artifacts: &GitArtifacts) -> Self {
        Self {
            label,
            artifacts: artifacts.clone(),
        }
    }
}

impl StageInputs for GitArtifactStage {
    fn dependency_inputs(&self) -> StageResult<Vec<StageInput>> {
        let mut inputs = vec![StageInput::from(self.label)];
        inputs.push(match &self.artifacts.local {
            Some(local) => encode(local)?,
            None => StageInput::Absent,
        });
        for remote in &self.artifacts.remote {
            inputs.push(encode(remote)?);
        }
        Ok(inputs)
    }
}

/// Canonical JSON form of an artifact descriptor.
fn encode<T: Serialize>(descriptor: &T) -> StageResult<StageInput> {
    serde_json::to_vec(descriptor)
        .map(StageInput::Bytes)
        .map_err(|e| StageError::Encode(e.to_string()))
}

/// Source stage keyed on the application's dependency file.
///
/// The dependency file is the first entry of `build_path/*`, in sorted
/// order, whose path matches the dependency file pattern. Its contents are
/// read at most once per stage.
#[derive(Debug)]
pub struct DependencyFileStage {
    build_path: PathBuf,
    pattern: Regex,
    app_install: Vec<String>,
    contents: OnceLock<Option<Vec<u8>>>,
}

impl DependencyFileStage {
    pub fn new(build_path: impl Into<PathBuf>, app_install: &[String]) -> StageResult<Self> {
        Self::with_pattern(build_path, app_install, DEPENDENCY_FILE_PATTERN)
    }

    pub fn with_pattern(
        build_path: impl Into<PathBuf>,
        app_install: &[String],
        pattern: &str,
    ) -> StageResult<Self> {
        let pattern = Regex::new(pattern).map_err(|e| StageError::Pattern(e.to_string()))?;
        Ok(Self {
            build_path: build_path.into(),
            pattern,
            app_install: app_install.to_vec(),
            contents: OnceLock::new(),
        })
    }

    pub fn build_path(&self) -> &Path {
        &self.build_path
    }

    /// First matching dependency file, if any.
    pub fn dependency_file(&self) -> StageResult<Option<PathBuf>> {
        let listing = format!("{}/*", Pattern::escape(&self.build_path.to_string_lossy()));
        let mut entries: Vec<PathBuf> = glob(&listing)
            .map_err(|e| StageError::Pattern(e.to_string()))?
            .filter_map(|entry| entry.ok())
            .collect();
        entries.sort();

        Ok(entries
            .into_iter()
            .find(|path| self.pattern.is_match(&path.to_string_lossy())))
    }

    /// Contents of the dependency file; `None` when there is none.
    pub fn dependency_file_contents(&self) -> StageResult<Option<&[u8]>> {
        if let Some(contents) = self.contents.get() {
            return Ok(contents.as_deref());
        }

        let contents = match self.dependency_file()? {
            Some(path) => match std::fs::read(&path) {
                Ok(bytes) => {
                    debug!("Dependency file {} ({} bytes)", path.display(), bytes.len());
                    Some(bytes)
                }
                Err(e) if e.kind() == ErrorKind::NotFound => None,
                Err(e) => return Err(StageError::Io(path, e)),
            },
            None => {
                debug!("No dependency file in {}", self.build_path.display());
                None
            }
        };

        Ok(self.contents.get_or_init(|| contents).as_deref())
    }
}

impl StageInputs for DependencyFileStage {
    fn dependency_inputs(&self) -> StageResult<Vec<StageInput>> {
        let mut inputs: Vec<StageInput> = Vec::with_capacity(self.app_install.len() + 2);
        inputs.push(self.dependency_file_contents()?.map(<[u8]>::to_vec).into());
        inputs.push(self.pattern.as_str().into());
        inputs.extend(self.app_install.iter().map(|i| StageInput::from(i.as_str())));
        Ok(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convenient_dappfile::{ArtifactPlacement, LocalGitArtifact, RemoteGitArtifact};
    use std::fs;
    use tempfile::TempDir;

    fn install() -> Vec<String> {
        vec!["bundle install".to_string()]
    }

    #[test]
    fn from_stage_without_image_is_absent() {
        assert_eq!(
            FromStage::new(None).dependency_inputs().unwrap(),
            vec![StageInput::Absent]
        );
        assert_eq!(
            FromStage::new(Some("centos:7")).dependency_inputs().unwrap(),
            vec![StageInput::from("centos:7")]
        );
    }

    #[test]
    fn instructions_are_labelled() {
        let stage = InstructionsStage::new("infra_install", &["yum install -y ruby".to_string()]);
        assert_eq!(
            stage.dependency_inputs().unwrap(),
            vec![
                StageInput::from("infra_install"),
                StageInput::from("yum install -y ruby")
            ]
        );
    }

    #[test]
    fn git_artifact_inputs_follow_descriptors() {
        let mut artifacts = GitArtifacts::default();
        let without_local = GitArtifactStage::new("source_1", &artifacts)
            .dependency_inputs()
            .unwrap();
        assert_eq!(
            without_local,
            vec![StageInput::from("source_1"), StageInput::Absent]
        );

        artifacts.local = Some(LocalGitArtifact {
            placement: ArtifactPlacement::new("/app"),
        });
        artifacts.remote.push(RemoteGitArtifact::new(
            "https://host/org/lib.git",
            "master",
            None,
            ArtifactPlacement::new("/lib"),
        ));
        let inputs = GitArtifactStage::new("source_1", &artifacts)
            .dependency_inputs()
            .unwrap();
        assert_eq!(inputs.len(), 3);
        assert!(inputs.iter().all(|input| *input != StageInput::Absent));
    }

    #[test]
    fn picks_first_sorted_dependency_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("composer.json"), "{}").unwrap();
        fs::write(temp.path().join("Gemfile"), "gem 'rails'").unwrap();
        fs::write(temp.path().join("README"), "hello").unwrap();

        let stage = DependencyFileStage::new(temp.path(), &install()).unwrap();
        assert_eq!(
            stage.dependency_file().unwrap(),
            Some(temp.path().join("Gemfile"))
        );
        assert_eq!(
            stage.dependency_file_contents().unwrap(),
            Some(&b"gem 'rails'"[..])
        );
    }

    #[test]
    fn missing_dependency_file_is_absent() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("README"), "hello").unwrap();

        let stage = DependencyFileStage::new(temp.path(), &install()).unwrap();
        let inputs = stage.dependency_inputs().unwrap();
        assert_eq!(inputs[0], StageInput::Absent);
        assert_eq!(inputs[1], StageInput::from(DEPENDENCY_FILE_PATTERN));
        assert_eq!(inputs[2], StageInput::from("bundle install"));
    }

    #[test]
    fn missing_build_path_is_absent() {
        let stage = DependencyFileStage::new("/definitely/not/here", &install()).unwrap();
        assert_eq!(stage.dependency_file_contents().unwrap(), None);
    }

    #[test]
    fn empty_dependency_file_is_not_absent() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("Gemfile"), "").unwrap();

        let stage = DependencyFileStage::new(temp.path(), &install()).unwrap();
        assert_eq!(
            stage.dependency_inputs().unwrap()[0],
            StageInput::Bytes(Vec::new())
        );
    }

    #[test]
    fn contents_are_read_once() {
        let temp = TempDir::new().unwrap();
        let gemfile = temp.path().join("Gemfile");
        fs::write(&gemfile, "gem 'rails'").unwrap();

        let stage = DependencyFileStage::new(temp.path(), &install()).unwrap();
        let first = stage.dependency_inputs().unwrap();
        fs::write(&gemfile, "gem 'sinatra'").unwrap();
        let second = stage.dependency_inputs().unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn directory_named_like_dependency_file_is_io_error() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("Gemfile")).unwrap();

        let stage = DependencyFileStage::new(temp.path(), &install()).unwrap();
        assert!(matches!(
            stage.dependency_file_contents(),
            Err(StageError::Io(_, _))
        ));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let result = DependencyFileStage::with_pattern("/tmp", &install(), "(unclosed");
        assert!(matches!(result, Err(StageError::Pattern(_))));
    }
}
