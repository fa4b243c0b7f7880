//! Dapp command-line interface
//!
//! - `apps`: Resolve the applications matching a pattern
//! - `file`: Resolve a single Dappfile
//! - `stages`: Stage signatures and what must be rebuilt

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use convenient_dappfile::{
    AppSpec, AppType, ConfigInterpreter, ConfigLayer, DappConfig, DappfileError,
};
use convenient_git::Git2SourceControl;

pub mod apps;
pub mod file;
pub mod stages;

pub type CommandResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Dapp - build Docker images from Dappfiles
#[derive(Parser)]
#[command(name = "dapp")]
#[command(about = "Resolve Dappfiles into application specs and stage signatures")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Settings shared by every command; they form the command line layer.
#[derive(clap::Args, Debug, Default)]
pub struct GlobalArgs {
    /// Settings file (YAML) overlaid on the defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// File name searched for in application directories
    #[arg(long, global = true)]
    pub dappfile_name: Option<String>,

    /// Application type; overrides `type` in Dappfiles
    #[arg(long = "type", global = true)]
    pub app_type: Option<AppType>,

    /// Branch of remote git artifacts that do not name one
    #[arg(long, global = true)]
    pub git_artifact_branch: Option<String>,

    /// Suppress the processing log
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Show the processing log and debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    /// The command line as a settings layer.
    pub fn layer(&self) -> ConfigLayer {
        ConfigLayer {
            dappfile_name: self.dappfile_name.clone(),
            app_type: self.app_type,
            git_artifact_branch: self.git_artifact_branch.clone(),
            log_quiet: self.quiet.then_some(true),
            log_verbose: self.verbose.then_some(true),
        }
    }

    /// Defaults < settings file < command line.
    pub fn dapp_config(&self) -> Result<DappConfig, DappfileError> {
        let file = self.config.as_deref().map(ConfigLayer::load).transpose()?;
        Ok(DappConfig::layered(file, self.layer()))
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the applications matching a name pattern
    Apps {
        /// Application name pattern, e.g. `proj-api` or `*`
        #[arg(default_value = "*")]
        pattern: String,

        /// Directory holding one subdirectory per project
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Print full application specs as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve a single Dappfile
    File {
        /// Path to the Dappfile
        path: PathBuf,

        /// Only applications whose name starts with this
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Show stage signatures of the applications matching a pattern
    Stages {
        /// Application name pattern
        #[arg(default_value = "*")]
        pattern: String,

        /// Directory holding one subdirectory per project
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Build directory searched for dependency files
        #[arg(short, long, default_value = "build")]
        build_dir: PathBuf,

        /// Signature store to compare against
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Record the current signatures in the store
        #[arg(long, requires = "cache")]
        record: bool,
    },
}

/// Run a parsed command line, writing results to stdout.
pub fn run(cli: Cli) -> CommandResult {
    let interpreter = ConfigInterpreter::new(cli.global.dapp_config()?, Git2SourceControl);
    let mut out = std::io::stdout().lock();

    match cli.command {
        Commands::Apps { pattern, dir, json } => {
            apps::execute(&interpreter, &dir, &pattern, json, &mut out)
        }
        Commands::File { path, filter } => {
            file::execute(&interpreter, &path, filter.as_deref(), &mut out)
        }
        Commands::Stages {
            pattern,
            dir,
            build_dir,
            cache,
            record,
        } => stages::execute(
            &interpreter,
            &stages::StageOptions {
                dir: &dir,
                pattern: &pattern,
                build_dir: &build_dir,
                cache: cache.as_deref(),
                record,
            },
            &mut out,
        ),
    }
}

/// Errors raised by the front end itself.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("no {dappfile_name} found for '{pattern}' under {}", dir.display())]
    NoDappfile {
        pattern: String,
        dir: PathBuf,
        dappfile_name: String,
    },
}

pub(crate) fn no_dappfile(config: &DappConfig, dir: &Path, pattern: &str) -> CliError {
    CliError::NoDappfile {
        pattern: pattern.to_string(),
        dir: dir.to_path_buf(),
        dappfile_name: config.dappfile_name.clone(),
    }
}

/// Print one line per application.
pub(crate) fn print_names(specs: &[AppSpec], out: &mut impl std::io::Write) -> CommandResult {
    for spec in specs {
        writeln!(out, "{}", spec.name())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "dapp", "apps", "proj-*", "--type", "shell", "--git-artifact-branch", "stable",
        ])
        .unwrap();

        assert_eq!(cli.global.app_type, Some(AppType::Shell));
        let layer = cli.global.layer();
        assert_eq!(layer.git_artifact_branch.as_deref(), Some("stable"));
        assert_eq!(layer.log_quiet, None);
        assert!(matches!(cli.command, Commands::Apps { ref pattern, .. } if pattern == "proj-*"));
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        assert!(Cli::try_parse_from(["dapp", "-q", "-v", "apps"]).is_err());
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(Cli::try_parse_from(["dapp", "apps", "--type", "ansible"]).is_err());
    }

    #[test]
    fn record_requires_cache() {
        assert!(Cli::try_parse_from(["dapp", "stages", "--record"]).is_err());
        assert!(Cli::try_parse_from(["dapp", "stages", "--record", "--cache", "c.json"]).is_ok());
    }

    #[test]
    fn command_line_pins_type_over_settings_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let settings = temp.path().join("dapp.yml");
        std::fs::write(&settings, "type: chef\ndappfile_name: Dappfile.yml\n").unwrap();

        let global = GlobalArgs {
            config: Some(settings),
            app_type: Some(AppType::Shell),
            ..Default::default()
        };
        let config = global.dapp_config().unwrap();
        assert_eq!(config.dappfile_name, "Dappfile.yml");
        assert_eq!(config.forced_type, Some(AppType::Shell));
    }

    #[test]
    fn missing_settings_file_is_an_error() {
        let global = GlobalArgs {
            config: Some(PathBuf::from("/definitely/not/here.yml")),
            ..Default::default()
        };
        assert!(matches!(global.dapp_config(), Err(DappfileError::IoError(_, _))));
    }
}
