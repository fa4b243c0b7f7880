//! Option sets and the application specs flattened from them
//!
//! An [`OptionSet`] accumulates options while a Dappfile is evaluated. Nested
//! `app` blocks branch a copy of their parent's options, so nothing a child
//! does is visible to the parent or to its siblings. Once evaluation is done
//! the tree is flattened into [`AppSpec`]s, one per leaf application.

use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::Serialize;

use crate::error::{BranchFailure, ConfigError};
use crate::git_artifact::GitArtifacts;
use crate::log::LogOptions;
use crate::settings::AppType;

/// Instruction lists that only shell applications may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionList {
    InfraInstall,
    InfraSetup,
    AppInstall,
    AppSetup,
}

impl InstructionList {
    pub fn directive(self) -> &'static str {
        match self {
            InstructionList::InfraInstall => "infra_install",
            InstructionList::InfraSetup => "infra_setup",
            InstructionList::AppInstall => "app_install",
            InstructionList::AppSetup => "app_setup",
        }
    }
}

/// Option values, cloned when an `app` block branches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    pub basename: String,
    /// Full hyphenated name of the application
    pub name: String,
    pub home_path: PathBuf,
    pub app_type: Option<AppType>,
    pub from_image: Option<String>,
    pub infra_install: Vec<String>,
    pub infra_setup: Vec<String>,
    pub app_install: Vec<String>,
    pub app_setup: Vec<String>,
    pub exposes: Vec<String>,
    pub dapps: Vec<String>,
    pub git_artifact: GitArtifacts,
    pub log_indent: usize,
    /// Glob prefix an application name must match to be emitted
    pub app_filter: Option<Pattern>,
}

/// Mutable accumulator for one application declaration.
#[derive(Debug, Clone)]
pub struct OptionSet {
    options: Options,
    apps: Vec<OptionSet>,
    failure: Option<ConfigError>,
}

impl OptionSet {
    /// Root option set of a Dappfile located in `home_path`.
    pub fn root(home_path: impl Into<PathBuf>, app_type: Option<AppType>) -> Self {
        let home_path = home_path.into();
        let basename = home_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            options: Options {
                name: basename.clone(),
                basename,
                home_path,
                app_type,
                ..Options::default()
            },
            apps: Vec::new(),
            failure: None,
        }
    }

    /// Child for a nested `app` block: a copy of the current options with the
    /// hyphenated name and one more level of log indentation. Child apps of
    /// `self` are not carried over. A root without a directory name (a
    /// Dappfile in `/`) names its children without a leading hyphen.
    pub fn branch(&self, child: &str) -> Self {
        let name = if self.options.name.is_empty() {
            child.to_string()
        } else {
            format!("{}-{}", self.options.name, child)
        };
        let mut options = self.options.clone();
        options.basename = name.clone();
        options.name = name;
        options.log_indent += 1;

        Self {
            options,
            apps: Vec::new(),
            failure: None,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn name(&self) -> &str {
        &self.options.name
    }

    pub fn home_path(&self) -> &Path {
        &self.options.home_path
    }

    pub fn app_type(&self) -> Option<AppType> {
        self.options.app_type
    }

    pub fn apps(&self) -> &[OptionSet] {
        &self.apps
    }

    pub fn failure(&self) -> Option<&ConfigError> {
        self.failure.as_ref()
    }

    pub fn log_indent(&self) -> usize {
        self.options.log_indent
    }

    pub fn indent_log(&mut self) {
        self.options.log_indent += 1;
    }

    pub fn set_app_filter(&mut self, filter: Option<Pattern>) {
        self.options.app_filter = filter;
    }

    pub fn set_app_type(&mut self, app_type: AppType) {
        self.options.app_type = Some(app_type);
    }

    pub fn set_from_image(&mut self, image: &str) {
        self.options.from_image = Some(image.to_string());
    }

    pub fn expose(&mut self, values: impl IntoIterator<Item = String>) {
        self.options.exposes.extend(values);
    }

    pub fn dappit(&mut self, values: impl IntoIterator<Item = String>) {
        self.options.dapps.extend(values);
    }

    /// Append instructions, refused unless the application is of type shell.
    pub fn add_instructions(
        &mut self,
        list: InstructionList,
        values: impl IntoIterator<Item = String>,
    ) -> Result<(), ConfigError> {
        if self.options.app_type != Some(AppType::Shell) {
            return Err(ConfigError::TypeMismatch {
                directive: list.directive().to_string(),
                app_type: self.options.app_type,
            });
        }

        let target = match list {
            InstructionList::InfraInstall => &mut self.options.infra_install,
            InstructionList::InfraSetup => &mut self.options.infra_setup,
            InstructionList::AppInstall => &mut self.options.app_install,
            InstructionList::AppSetup => &mut self.options.app_setup,
        };
        target.extend(values);
        Ok(())
    }

    pub fn git_artifact_mut(&mut self) -> &mut GitArtifacts {
        &mut self.options.git_artifact
    }

    pub fn add_app(&mut self, app: OptionSet) {
        self.apps.push(app);
    }

    /// Mark this branch as abandoned.
    pub fn fail(&mut self, error: ConfigError) {
        self.failure = Some(error);
    }

    /// Emit one spec per leaf application.
    ///
    /// An application with nested apps is never built itself. Failed branches
    /// are reported instead of flattened.
    pub fn flatten(&self, log: &LogOptions) -> Resolution {
        let mut resolution = Resolution::default();
        self.flatten_into(log, &mut resolution);
        resolution
    }

    fn flatten_into(&self, log: &LogOptions, resolution: &mut Resolution) {
        if let Some(error) = &self.failure {
            resolution.failures.push(BranchFailure {
                app: self.options.name.clone(),
                error: error.clone(),
            });
            return;
        }

        if self.apps.is_empty() {
            if let Some(spec) = self.to_spec(log) {
                resolution.specs.push(spec);
            }
            return;
        }

        for app in &self.apps {
            app.flatten_into(log, resolution);
        }
    }

    /// Snapshot of this option set, `None` when the filter rejects it.
    pub fn to_spec(&self, log: &LogOptions) -> Option<AppSpec> {
        let options = &self.options;
        if let Some(filter) = &options.app_filter {
            if !filter.matches(&options.name) {
                let prefix = filter.as_str().strip_suffix('*').unwrap_or(filter.as_str());
                log.log(
                    options.log_indent,
                    &format!("Skipped (does not match filter: '{prefix}')!"),
                );
                return None;
            }
        }

        log.log(
            options.log_indent,
            &format!("Prepared application config '{}'", options.name),
        );
        Some(AppSpec {
            name: options.name.clone(),
            app_type: options.app_type,
            from_image: options.from_image.clone(),
            home_path: options.home_path.clone(),
            dapps: options.dapps.clone(),
            exposes: options.exposes.clone(),
            git_artifact: options.git_artifact.clone(),
            infra_install: options.infra_install.clone(),
            infra_setup: options.infra_setup.clone(),
            app_install: options.app_install.clone(),
            app_setup: options.app_setup.clone(),
        })
    }
}

/// Immutable description of one buildable application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppSpec {
    name: String,
    #[serde(rename = "type")]
    app_type: Option<AppType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    from_image: Option<String>,
    home_path: PathBuf,
    dapps: Vec<String>,
    exposes: Vec<String>,
    #[serde(skip_serializing_if = "GitArtifacts::is_empty")]
    git_artifact: GitArtifacts,
    infra_install: Vec<String>,
    infra_setup: Vec<String>,
    app_install: Vec<String>,
    app_setup: Vec<String>,
}

impl AppSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn app_type(&self) -> Option<AppType> {
        self.app_type
    }

    pub fn from_image(&self) -> Option<&str> {
        self.from_image.as_deref()
    }

    pub fn home_path(&self) -> &Path {
        &self.home_path
    }

    pub fn dapps(&self) -> &[String] {
        &self.dapps
    }

    pub fn exposes(&self) -> &[String] {
        &self.exposes
    }

    pub fn git_artifact(&self) -> &GitArtifacts {
        &self.git_artifact
    }

    pub fn infra_install(&self) -> &[String] {
        &self.infra_install
    }

    pub fn infra_setup(&self) -> &[String] {
        &self.infra_setup
    }

    pub fn app_install(&self) -> &[String] {
        &self.app_install
    }

    pub fn app_setup(&self) -> &[String] {
        &self.app_setup
    }
}

/// Outcome of flattening: specs of the leaves that resolved, and the branches
/// that did not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub specs: Vec<AppSpec>,
    pub failures: Vec<BranchFailure>,
}

impl Resolution {
    pub fn extend(&mut self, other: Resolution) {
        self.specs.extend(other.specs);
        self.failures.extend(other.failures);
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Specs, or every branch failure as one error.
    pub fn into_result(self) -> crate::error::Result<Vec<AppSpec>> {
        if self.failures.is_empty() {
            Ok(self.specs)
        } else {
            Err(crate::error::DappfileError::BranchesFailed(self.failures))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn shell_root() -> OptionSet {
        OptionSet::root("/work/proj", Some(AppType::Shell))
    }

    #[test]
    fn root_takes_directory_name() {
        let root = shell_root();
        assert_eq!(root.name(), "proj");
        assert_eq!(root.options().basename, "proj");
        assert_eq!(root.log_indent(), 0);
    }

    #[test]
    fn branch_chains_names_and_indents() {
        let root = shell_root();
        let child = root.branch("api");
        let grandchild = child.branch("v2");

        assert_eq!(child.name(), "proj-api");
        assert_eq!(grandchild.name(), "proj-api-v2");
        assert_eq!(grandchild.options().basename, "proj-api-v2");
        assert_eq!(grandchild.log_indent(), 2);
    }

    #[test]
    fn filesystem_root_names_children_plainly() {
        let root = OptionSet::root("/", Some(AppType::Shell));
        assert_eq!(root.name(), "");

        let child = root.branch("a");
        assert_eq!(child.name(), "a");
        assert_eq!(child.branch("b").name(), "a-b");
    }

    #[test]
    fn branch_is_isolated_from_parent() {
        let mut root = shell_root();
        root.add_instructions(InstructionList::AppInstall, ["base".to_string()])
            .unwrap();

        let mut child = root.branch("a");
        child
            .add_instructions(InstructionList::AppInstall, ["child".to_string()])
            .unwrap();
        child.expose(["8080".to_string()]);

        assert_eq!(root.options().app_install, vec!["base"]);
        assert!(root.options().exposes.is_empty());
        assert_eq!(child.options().app_install, vec!["base", "child"]);
    }

    #[test]
    fn branch_does_not_copy_child_apps() {
        let mut root = shell_root();
        let first = root.branch("a");
        root.add_app(first);

        let second = root.branch("b");
        assert!(second.apps().is_empty());
    }

    #[test]
    fn instructions_need_shell_type() {
        let mut root = OptionSet::root("/work/proj", Some(AppType::Chef));
        let err = root
            .add_instructions(InstructionList::AppInstall, ["bundle install".to_string()])
            .unwrap_err();

        assert_eq!(
            err,
            ConfigError::TypeMismatch {
                directive: "app_install".to_string(),
                app_type: Some(AppType::Chef),
            }
        );
        assert!(root.options().app_install.is_empty());
    }

    #[test]
    fn instructions_need_a_type_at_all() {
        let mut root = OptionSet::root("/work/proj", None);
        let result = root.add_instructions(InstructionList::InfraSetup, ["x".to_string()]);
        assert!(matches!(result, Err(ConfigError::TypeMismatch { .. })));
    }

    #[test]
    fn flatten_without_apps_emits_root() {
        let root = shell_root();
        let resolution = root.flatten(&LogOptions::default());

        assert_eq!(resolution.specs.len(), 1);
        assert_eq!(resolution.specs[0].name(), "proj");
    }

    #[test]
    fn flatten_emits_only_leaves() {
        let mut root = shell_root();
        let mut parent = root.branch("backend");
        let leaf_a = parent.branch("api");
        let leaf_b = parent.branch("worker");
        parent.add_app(leaf_a);
        parent.add_app(leaf_b);
        root.add_app(parent);
        let solo = root.branch("frontend");
        root.add_app(solo);

        let names: Vec<_> = root
            .flatten(&LogOptions::default())
            .specs
            .iter()
            .map(|spec| spec.name().to_string())
            .collect();

        assert_eq!(
            names,
            vec!["proj-backend-api", "proj-backend-worker", "proj-frontend"]
        );
    }

    #[test]
    fn flatten_reports_failed_branches() {
        let mut root = shell_root();
        let mut broken = root.branch("broken");
        broken.fail(ConfigError::UnknownDirective("frobnicate".to_string()));
        root.add_app(broken);
        let ok = root.branch("ok");
        root.add_app(ok);

        let resolution = root.flatten(&LogOptions::default());
        assert_eq!(resolution.specs.len(), 1);
        assert_eq!(resolution.specs[0].name(), "proj-ok");
        assert_eq!(resolution.failures.len(), 1);
        assert_eq!(resolution.failures[0].app, "proj-broken");
        assert!(!resolution.is_success());
        assert!(resolution.into_result().is_err());
    }

    #[traced_test]
    #[test]
    fn filter_matches_name_prefix() {
        let mut root = OptionSet::root("/work/web", Some(AppType::Shell));
        root.set_app_filter(Some(Pattern::new("web*").unwrap()));
        let api = root.branch("api");
        root.add_app(api);

        let mut worker = OptionSet::root("/work/worker", Some(AppType::Shell));
        worker.set_app_filter(Some(Pattern::new("web*").unwrap()));

        let log = LogOptions::default();
        assert_eq!(root.flatten(&log).specs[0].name(), "web-api");
        assert!(worker.flatten(&log).specs.is_empty());
        assert!(logs_contain("Prepared application config 'web-api'"));
        assert!(logs_contain("Skipped (does not match filter: 'web')!"));
    }

    #[test]
    fn spec_serializes_type_field() {
        let mut root = shell_root();
        root.set_from_image("centos:7");
        let spec = root.to_spec(&LogOptions::default()).unwrap();

        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["type"], "shell");
        assert_eq!(json["from_image"], "centos:7");
        assert!(json.get("git_artifact").is_none());
    }
}
