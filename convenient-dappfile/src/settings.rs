//! Interpreter settings
//!
//! Settings are layered explicitly: built-in defaults, then an optional
//! settings file, then Dappfile directives, then command line flags. A layer
//! only overrides what it sets.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DappfileError;
use crate::log::LogOptions;

pub const DEFAULT_DAPPFILE_NAME: &str = "Dappfile";

/// How an application image is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppType {
    /// Instructions are shell commands run in stages
    Shell,
    Chef,
    Dockerfile,
}

impl AppType {
    pub fn as_str(self) -> &'static str {
        match self {
            AppType::Shell => "shell",
            AppType::Chef => "chef",
            AppType::Dockerfile => "dockerfile",
        }
    }
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppType {
    type Err = UnknownAppType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shell" => Ok(AppType::Shell),
            "chef" => Ok(AppType::Chef),
            "dockerfile" => Ok(AppType::Dockerfile),
            other => Err(UnknownAppType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown application type '{0}' (expected shell, chef or dockerfile)")]
pub struct UnknownAppType(pub String);

/// One layer of settings. Unset fields leave lower layers untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dappfile_name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub app_type: Option<AppType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_artifact_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_quiet: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_verbose: Option<bool>,
}

impl ConfigLayer {
    /// Load a settings file (YAML).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DappfileError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| DappfileError::IoError(path.to_path_buf(), e.to_string()))?;
        serde_yaml::from_str(&content)
            .map_err(|e| DappfileError::ParseError(path.to_path_buf(), e.to_string()))
    }
}

/// Resolved settings handed to the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DappConfig {
    /// File name searched for by `locate_source_files`
    pub dappfile_name: String,
    /// Type every root starts with
    pub app_type: Option<AppType>,
    /// Type pinned on the command line; Dappfile `type` directives are ignored
    pub forced_type: Option<AppType>,
    /// Default branch of remote git artifacts instead of the current branch
    pub git_artifact_branch: Option<String>,
    pub log: LogOptions,
}

impl Default for DappConfig {
    fn default() -> Self {
        Self {
            dappfile_name: DEFAULT_DAPPFILE_NAME.to_string(),
            app_type: None,
            forced_type: None,
            git_artifact_branch: None,
            log: LogOptions::default(),
        }
    }
}

impl DappConfig {
    /// Defaults, overlaid by an optional settings file, overlaid by the
    /// command line layer. A type on the command line pins the type.
    pub fn layered(file: Option<ConfigLayer>, cli: ConfigLayer) -> Self {
        let mut config = Self::default();
        if let Some(file) = file {
            config.merge(&file);
        }
        config.merge(&cli);
        config.forced_type = cli.app_type;
        config
    }

    /// Overlay wins for every field it sets.
    pub fn merge(&mut self, overlay: &ConfigLayer) {
        if let Some(name) = &overlay.dappfile_name {
            self.dappfile_name = name.clone();
        }
        if overlay.app_type.is_some() {
            self.app_type = overlay.app_type;
        }
        if overlay.git_artifact_branch.is_some() {
            self.git_artifact_branch = overlay.git_artifact_branch.clone();
        }
        if let Some(quiet) = overlay.log_quiet {
            self.log.quiet = quiet;
        }
        if let Some(verbose) = overlay.log_verbose {
            self.log.verbose = verbose;
        }
    }

    /// Type a fresh root starts with.
    pub fn initial_type(&self) -> Option<AppType> {
        self.forced_type.or(self.app_type)
    }
}
