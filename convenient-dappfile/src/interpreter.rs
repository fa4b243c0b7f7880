//! Dappfile interpreter
//!
//! Finds Dappfiles for an application name pattern, evaluates their
//! directives into an [`OptionSet`] tree and flattens it into
//! [`AppSpec`](crate::option_set::AppSpec)s.

use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use convenient_git::SourceControl;
use glob::{Pattern, glob};
use serde_yaml::Value;
use tracing::{debug, warn};

use crate::directives::evaluate;
use crate::error::{ConfigError, DappfileError, Result};
use crate::option_set::{OptionSet, Resolution};
use crate::settings::DappConfig;

/// Why evaluation of a directive list stopped.
#[derive(Debug)]
pub(crate) enum Halt {
    /// Abandons the current application branch only
    Config(ConfigError),
    /// Aborts the whole Dappfile
    Fatal(DappfileError),
}

impl From<ConfigError> for Halt {
    fn from(error: ConfigError) -> Self {
        Halt::Config(error)
    }
}

impl From<DappfileError> for Halt {
    fn from(error: DappfileError) -> Self {
        Halt::Fatal(error)
    }
}

/// State shared by every branch of one Dappfile.
pub(crate) struct Evaluation<'a> {
    config: &'a DappConfig,
    scm: &'a dyn SourceControl,
    home_branch: OnceCell<String>,
}

impl<'a> Evaluation<'a> {
    fn new(config: &'a DappConfig, scm: &'a dyn SourceControl) -> Self {
        Self {
            config,
            scm,
            home_branch: OnceCell::new(),
        }
    }

    pub(crate) fn config(&self) -> &DappConfig {
        self.config
    }

    pub(crate) fn log(&self, indent: usize, message: &str) {
        self.config.log.log(indent, message);
    }

    pub(crate) fn warn(&self, indent: usize, app: &str, error: &ConfigError) {
        warn!("Application '{}' abandoned: {}", app, error);
        self.log(indent, &format!("Failed: {error}"));
    }

    /// Branch checked out in `home_path`, looked up at most once per Dappfile.
    pub(crate) fn home_branch(&self, home_path: &Path) -> Result<String> {
        if let Some(branch) = self.home_branch.get() {
            return Ok(branch.clone());
        }
        let branch = self
            .scm
            .current_branch(home_path)
            .map_err(|e| DappfileError::SourceControl(home_path.to_path_buf(), e))?;
        Ok(self.home_branch.get_or_init(|| branch).clone())
    }
}

/// Glob an application name must match: `filter` followed by anything.
///
/// Trailing `*` are folded into the appended one, so `proj-*` and `proj-`
/// select the same applications.
fn filter_pattern(filter: &str) -> Result<Pattern> {
    Pattern::new(&format!("{}*", filter.trim_end_matches('*')))
        .map_err(|e| DappfileError::InvalidPattern(filter.to_string(), e.to_string()))
}

/// Turns Dappfiles into application specs.
pub struct ConfigInterpreter<S> {
    config: DappConfig,
    scm: S,
}

impl<S: SourceControl> ConfigInterpreter<S> {
    pub fn new(config: DappConfig, scm: S) -> Self {
        Self { config, scm }
    }

    pub fn config(&self) -> &DappConfig {
        &self.config
    }

    /// Dappfiles for an application name pattern.
    ///
    /// For `a-b-c` the directories `a-b-c`, `a-b` and `a` below `path` are
    /// tried in that order; the first one holding any match wins.
    pub fn locate_source_files(&self, path: &Path, name_pattern: &str) -> Result<Vec<PathBuf>> {
        let segments: Vec<&str> = name_pattern.split('-').collect();
        let base = Pattern::escape(&path.to_string_lossy());

        for len in (1..=segments.len()).rev() {
            let prefix = segments[..len].join("-");
            let pattern = format!("{}/{}/{}", base, prefix, self.config.dappfile_name);
            let matches: Vec<PathBuf> = glob(&pattern)
                .map_err(|e| {
                    DappfileError::InvalidPattern(name_pattern.to_string(), e.to_string())
                })?
                .filter_map(|entry| entry.ok())
                .collect();

            if !matches.is_empty() {
                debug!("Pattern {} matched {} dappfile(s)", pattern, matches.len());
                return Ok(matches);
            }
        }

        Ok(Vec::new())
    }

    /// Process every Dappfile found for `name_pattern`, filtering
    /// applications by the same pattern.
    pub fn process_directory(&self, path: &Path, name_pattern: &str) -> Result<Resolution> {
        let mut resolution = Resolution::default();
        for dappfile in self.locate_source_files(path, name_pattern)? {
            resolution.extend(self.process_file(&dappfile, Some(name_pattern))?);
        }
        Ok(resolution)
    }

    /// Read and process a single Dappfile.
    pub fn process_file(&self, dappfile: &Path, app_filter: Option<&str>) -> Result<Resolution> {
        let content = std::fs::read_to_string(dappfile)
            .map_err(|e| DappfileError::IoError(dappfile.to_path_buf(), e.to_string()))?;
        self.process_source(dappfile, &content, app_filter)
    }

    /// Process Dappfile `content` as if it was read from `dappfile`.
    ///
    /// Configuration errors abandon the branch they occur in and show up in
    /// [`Resolution::failures`]; source control errors abort the file.
    ///
    /// Source control is only asked for the current branch when a remote
    /// git artifact needs it, so a Dappfile outside any repository resolves
    /// as long as its remote artifacts name a branch.
    pub fn process_source(
        &self,
        dappfile: &Path,
        content: &str,
        app_filter: Option<&str>,
    ) -> Result<Resolution> {
        let filter = app_filter.map(filter_pattern).transpose()?;

        let dappfile = std::path::absolute(dappfile)
            .map_err(|e| DappfileError::IoError(dappfile.to_path_buf(), e.to_string()))?;
        let home_path = dappfile
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));

        let mut root = OptionSet::root(home_path, self.config.initial_type());
        root.set_app_filter(filter);

        self.config
            .log
            .log(root.log_indent(), &format!("Processing dappfile '{}'", dappfile.display()));
        root.indent_log();

        let body: Value = if content.trim().is_empty() {
            Value::Null
        } else {
            serde_yaml::from_str(content)
                .map_err(|e| DappfileError::ParseError(dappfile.clone(), e.to_string()))?
        };

        let mut eval = Evaluation::new(&self.config, &self.scm);
        match evaluate(&mut eval, &mut root, &body) {
            Ok(()) => {}
            Err(Halt::Config(error)) => {
                eval.warn(root.log_indent(), root.name(), &error);
                root.fail(error);
            }
            Err(Halt::Fatal(error)) => return Err(error),
        }

        Ok(root.flatten(&self.config.log))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convenient_git::{GitError, GitResult, StaticBranch};
    use std::cell::Cell;
    use tracing_test::traced_test;

    /// Counts lookups so tests can check the branch is resolved once.
    struct CountingScm {
        calls: Cell<usize>,
    }

    impl SourceControl for CountingScm {
        fn current_branch(&self, _path: &Path) -> GitResult<String> {
            self.calls.set(self.calls.get() + 1);
            Ok("feature".to_string())
        }
    }

    struct BrokenScm;

    impl SourceControl for BrokenScm {
        fn current_branch(&self, path: &Path) -> GitResult<String> {
            Err(GitError::NotFound(path.to_path_buf()))
        }
    }

    fn interpreter() -> ConfigInterpreter<StaticBranch> {
        ConfigInterpreter::new(DappConfig::default(), StaticBranch("master".to_string()))
    }

    #[traced_test]
    #[test]
    fn logs_processing_and_preparation() {
        let source = "- app: api\n";
        interpreter()
            .process_source(Path::new("/work/proj/Dappfile"), source, None)
            .unwrap();

        assert!(logs_contain(" * Processing dappfile '/work/proj/Dappfile'"));
        assert!(logs_contain("  * Prepared application config 'proj-api'"));
    }

    #[traced_test]
    #[test]
    fn quiet_config_suppresses_log() {
        let mut config = DappConfig::default();
        config.log.quiet = true;
        let interpreter = ConfigInterpreter::new(config, StaticBranch("master".to_string()));

        interpreter
            .process_source(Path::new("/work/proj/Dappfile"), "- app: api\n", None)
            .unwrap();
        assert!(!logs_contain("Processing dappfile"));
    }

    #[test]
    fn branch_lookup_happens_once_per_file() {
        let scm = CountingScm { calls: Cell::new(0) };
        let interpreter = ConfigInterpreter::new(DappConfig::default(), scm);
        let source = r#"
- add_remote_git_artifact: { url: "https://host/a.git", to: /a }
- app:
    name: x
    body:
      - add_remote_git_artifact: { url: "https://host/b.git", to: /b }
"#;
        let resolution = interpreter
            .process_source(Path::new("/work/proj/Dappfile"), source, None)
            .unwrap();

        assert_eq!(interpreter.scm.calls.get(), 1);
        let remote = &resolution.specs[0].git_artifact().remote;
        assert_eq!(remote.len(), 2);
        assert!(remote.iter().all(|artifact| artifact.branch == "feature"));
    }

    #[test]
    fn branch_lookup_skipped_when_not_needed() {
        let scm = CountingScm { calls: Cell::new(0) };
        let interpreter = ConfigInterpreter::new(DappConfig::default(), scm);
        interpreter
            .process_source(
                Path::new("/work/proj/Dappfile"),
                "- add_remote_git_artifact: { url: \"https://host/a.git\", to: /a, branch: v1 }\n",
                None,
            )
            .unwrap();
        assert_eq!(interpreter.scm.calls.get(), 0);
    }

    #[test]
    fn configured_branch_beats_current_branch() {
        let config = DappConfig {
            git_artifact_branch: Some("stable".to_string()),
            ..DappConfig::default()
        };
        let interpreter = ConfigInterpreter::new(config, BrokenScm);
        let resolution = interpreter
            .process_source(
                Path::new("/work/proj/Dappfile"),
                "- add_remote_git_artifact: [\"git@host:org/lib.git\", /lib]\n",
                None,
            )
            .unwrap();

        let artifact = &resolution.specs[0].git_artifact().remote[0];
        assert_eq!(artifact.branch, "stable");
        assert_eq!(artifact.name, "lib");
    }

    #[test]
    fn no_repository_needed_without_remote_artifacts() {
        let interpreter = ConfigInterpreter::new(DappConfig::default(), BrokenScm);
        let resolution = interpreter
            .process_source(Path::new("/work/proj/Dappfile"), "- add_git_artifact: /app\n", None)
            .unwrap();
        assert_eq!(resolution.specs.len(), 1);
    }

    #[test]
    fn source_control_failure_aborts_file() {
        let interpreter = ConfigInterpreter::new(DappConfig::default(), BrokenScm);
        let source = r#"
- app:
    name: a
    body:
      - add_remote_git_artifact: { url: "https://host/a.git", to: /a }
- app: b
"#;
        let result = interpreter.process_source(Path::new("/work/proj/Dappfile"), source, None);
        assert!(matches!(result, Err(DappfileError::SourceControl(_, _))));
    }

    #[test]
    fn invalid_yaml_is_a_parse_error() {
        let result = interpreter().process_source(
            Path::new("/work/proj/Dappfile"),
            "- expose: [80\n",
            None,
        );
        assert!(matches!(result, Err(DappfileError::ParseError(_, _))));
    }

    #[test]
    fn root_level_error_fails_root() {
        let resolution = interpreter()
            .process_source(Path::new("/work/proj/Dappfile"), "- frobnicate\n", None)
            .unwrap();

        assert!(resolution.specs.is_empty());
        assert_eq!(resolution.failures[0].app, "proj");
        assert_eq!(
            resolution.failures[0].error,
            ConfigError::UnknownDirective("frobnicate".to_string())
        );
    }

    #[traced_test]
    #[test]
    fn trailing_star_in_filter_is_folded() {
        let source = "- app: web\n- app: worker\n- app: api\n";
        let resolution = interpreter()
            .process_source(Path::new("/work/proj/Dappfile"), source, Some("proj-w*"))
            .unwrap();

        let names: Vec<&str> = resolution.specs.iter().map(|spec| spec.name()).collect();
        assert_eq!(names, vec!["proj-web", "proj-worker"]);
        assert!(logs_contain("Skipped (does not match filter: 'proj-w')!"));
    }

    #[test]
    fn star_filter_matches_everything() {
        for filter in ["*", "**", "p*"] {
            let resolution = interpreter()
                .process_source(
                    Path::new("/work/proj/Dappfile"),
                    "- app: a\n- app: b\n",
                    Some(filter),
                )
                .unwrap();
            assert_eq!(resolution.specs.len(), 2, "filter {filter}");
        }
    }

    #[test]
    fn invalid_filter_is_rejected() {
        let result =
            interpreter().process_source(Path::new("/work/proj/Dappfile"), "", Some("[web"));
        assert!(matches!(result, Err(DappfileError::InvalidPattern(_, _))));
    }
}
