//! Dappfile directive vocabulary
//!
//! Each directive name maps to a handler that mutates the current
//! [`OptionSet`]. Names outside the table are rejected.

use serde::Deserialize;
use serde_yaml::Value;
use tracing::debug;

use crate::error::ConfigError;
use crate::git_artifact::{ArtifactPlacement, LocalGitArtifact, RemoteGitArtifact};
use crate::interpreter::{Evaluation, Halt};
use crate::option_set::{InstructionList, OptionSet};
use crate::settings::AppType;

type Handler = fn(&mut Evaluation<'_>, &mut OptionSet, &Value) -> Result<(), Halt>;

const DIRECTIVES: &[(&str, Handler)] = &[
    ("type", set_type),
    ("expose", expose),
    ("from_centos7", from_centos7),
    ("from_ubuntu1404", from_ubuntu1404),
    ("from_ubuntu1604", from_ubuntu1604),
    ("dappit", dappit),
    ("infra_install", infra_install),
    ("infra_setup", infra_setup),
    ("app_install", app_install),
    ("app_setup", app_setup),
    ("add_git_artifact", add_git_artifact),
    ("add_remote_git_artifact", add_remote_git_artifact),
    ("app", app),
    ("build_dapp", build_dapp),
];

static NO_ARGS: Value = Value::Null;

/// Names of all supported directives, in table order.
pub fn directive_names() -> impl Iterator<Item = &'static str> {
    DIRECTIVES.iter().map(|(name, _)| *name)
}

fn lookup(name: &str) -> Option<Handler> {
    DIRECTIVES
        .iter()
        .find(|(directive, _)| *directive == name)
        .map(|(_, handler)| *handler)
}

/// Evaluate a directive list against `set`, in order.
pub(crate) fn evaluate(
    eval: &mut Evaluation<'_>,
    set: &mut OptionSet,
    body: &Value,
) -> Result<(), Halt> {
    let entries = match body {
        Value::Null => return Ok(()),
        Value::Sequence(entries) => entries,
        _ => {
            return Err(ConfigError::MalformedDirective(
                "a Dappfile body must be a list of directives".to_string(),
            )
            .into());
        }
    };

    for entry in entries {
        let (name, args) = split_entry(entry)?;
        let handler = lookup(name).ok_or_else(|| ConfigError::UnknownDirective(name.to_string()))?;
        debug!("{}: {}", set.name(), name);
        handler(eval, set, args)?;
    }
    Ok(())
}

/// `name` or `{ name: args }`.
fn split_entry(entry: &Value) -> Result<(&str, &Value), ConfigError> {
    match entry {
        Value::String(name) => Ok((name.as_str(), &NO_ARGS)),
        Value::Mapping(map) if map.len() == 1 => {
            let (key, args) = map
                .iter()
                .next()
                .ok_or_else(|| ConfigError::MalformedDirective("empty mapping".to_string()))?;
            match key {
                Value::String(name) => Ok((name.as_str(), args)),
                other => Err(ConfigError::MalformedDirective(format!(
                    "directive name must be a string, got {}",
                    describe(other)
                ))),
            }
        }
        Value::Mapping(map) => Err(ConfigError::MalformedDirective(format!(
            "expected exactly one directive per entry, got {}",
            map.len()
        ))),
        other => Err(ConfigError::MalformedDirective(format!(
            "expected a directive, got {}",
            describe(other)
        ))),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

fn scalar(directive: &str, value: &Value) -> Result<String, ConfigError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ConfigError::invalid(
            directive,
            format!("expected a value, got {}", describe(other)),
        )),
    }
}

/// Positional values; nested lists are flattened.
fn values(directive: &str, args: &Value) -> Result<Vec<String>, ConfigError> {
    let mut out = Vec::new();
    collect_values(directive, args, &mut out)?;
    Ok(out)
}

fn collect_values(directive: &str, args: &Value, out: &mut Vec<String>) -> Result<(), ConfigError> {
    match args {
        Value::Null => {}
        Value::Sequence(items) => {
            for item in items {
                collect_values(directive, item, out)?;
            }
        }
        other => out.push(scalar(directive, other)?),
    }
    Ok(())
}

fn no_args(directive: &str, args: &Value) -> Result<(), ConfigError> {
    match args {
        Value::Null => Ok(()),
        Value::Sequence(items) if items.is_empty() => Ok(()),
        other => Err(ConfigError::invalid(
            directive,
            format!("takes no arguments, got {}", describe(other)),
        )),
    }
}

fn keywords<T: for<'de> Deserialize<'de>>(directive: &str, args: &Value) -> Result<T, ConfigError> {
    serde_yaml::from_value(args.clone()).map_err(|e| ConfigError::invalid(directive, e))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Vec<String> {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(one) => vec![one],
            OneOrMany::Many(many) => many,
        }
    }
}

fn set_type(eval: &mut Evaluation<'_>, set: &mut OptionSet, args: &Value) -> Result<(), Halt> {
    let raw = scalar("type", args)?;
    let app_type: AppType = raw.parse().map_err(|e| ConfigError::invalid("type", e))?;

    match eval.config().forced_type {
        Some(forced) if forced != app_type => {
            eval.log(
                set.log_indent(),
                &format!("Type '{app_type}' ignored, '{forced}' was given on the command line"),
            );
        }
        _ => set.set_app_type(app_type),
    }
    Ok(())
}

fn expose(_eval: &mut Evaluation<'_>, set: &mut OptionSet, args: &Value) -> Result<(), Halt> {
    set.expose(values("expose", args)?);
    Ok(())
}

fn from_centos7(_eval: &mut Evaluation<'_>, set: &mut OptionSet, args: &Value) -> Result<(), Halt> {
    no_args("from_centos7", args)?;
    set.set_from_image("centos:7");
    Ok(())
}

fn from_ubuntu1404(
    _eval: &mut Evaluation<'_>,
    set: &mut OptionSet,
    args: &Value,
) -> Result<(), Halt> {
    no_args("from_ubuntu1404", args)?;
    set.set_from_image("ubuntu:14.04");
    Ok(())
}

fn from_ubuntu1604(
    _eval: &mut Evaluation<'_>,
    set: &mut OptionSet,
    args: &Value,
) -> Result<(), Halt> {
    no_args("from_ubuntu1604", args)?;
    set.set_from_image("ubuntu:16.04");
    Ok(())
}

fn dappit(_eval: &mut Evaluation<'_>, set: &mut OptionSet, args: &Value) -> Result<(), Halt> {
    set.dappit(values("dappit", args)?);
    Ok(())
}

fn instructions(set: &mut OptionSet, list: InstructionList, args: &Value) -> Result<(), Halt> {
    let values = values(list.directive(), args)?;
    set.add_instructions(list, values)?;
    Ok(())
}

fn infra_install(
    _eval: &mut Evaluation<'_>,
    set: &mut OptionSet,
    args: &Value,
) -> Result<(), Halt> {
    instructions(set, InstructionList::InfraInstall, args)
}

fn infra_setup(_eval: &mut Evaluation<'_>, set: &mut OptionSet, args: &Value) -> Result<(), Halt> {
    instructions(set, InstructionList::InfraSetup, args)
}

fn app_install(_eval: &mut Evaluation<'_>, set: &mut OptionSet, args: &Value) -> Result<(), Halt> {
    instructions(set, InstructionList::AppInstall, args)
}

fn app_setup(_eval: &mut Evaluation<'_>, set: &mut OptionSet, args: &Value) -> Result<(), Halt> {
    instructions(set, InstructionList::AppSetup, args)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlacementArgs {
    #[serde(alias = "where_to_add")]
    to: String,
    cwd: Option<String>,
    paths: Option<OneOrMany>,
    owner: Option<String>,
    group: Option<String>,
}

impl From<PlacementArgs> for ArtifactPlacement {
    fn from(args: PlacementArgs) -> Self {
        let mut placement = ArtifactPlacement::new(args.to);
        if let Some(cwd) = args.cwd {
            placement.cwd = cwd;
        }
        placement.paths = args.paths.map(Vec::from);
        placement.owner = args.owner;
        placement.group = args.group;
        placement
    }
}

fn add_git_artifact(
    _eval: &mut Evaluation<'_>,
    set: &mut OptionSet,
    args: &Value,
) -> Result<(), Halt> {
    let placement = match args {
        Value::String(to) => ArtifactPlacement::new(to.as_str()),
        _ => keywords::<PlacementArgs>("add_git_artifact", args)?.into(),
    };
    set.git_artifact_mut().local = Some(LocalGitArtifact { placement });
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RemoteArgs {
    url: String,
    #[serde(alias = "where_to_add")]
    to: String,
    branch: Option<String>,
    ssh_key_path: Option<String>,
    cwd: Option<String>,
    paths: Option<OneOrMany>,
    owner: Option<String>,
    group: Option<String>,
}

fn add_remote_git_artifact(
    eval: &mut Evaluation<'_>,
    set: &mut OptionSet,
    args: &Value,
) -> Result<(), Halt> {
    let (url, branch, ssh_key_path, placement) = match args {
        Value::Sequence(items) if items.len() == 2 => {
            let url = scalar("add_remote_git_artifact", &items[0])?;
            let to = scalar("add_remote_git_artifact", &items[1])?;
            (url, None, None, ArtifactPlacement::new(to))
        }
        _ => {
            let args: RemoteArgs = keywords("add_remote_git_artifact", args)?;
            let placement = PlacementArgs {
                to: args.to,
                cwd: args.cwd,
                paths: args.paths,
                owner: args.owner,
                group: args.group,
            };
            (args.url, args.branch, args.ssh_key_path, placement.into())
        }
    };

    let branch = match branch.or_else(|| eval.config().git_artifact_branch.clone()) {
        Some(branch) => branch,
        None => eval.home_branch(set.home_path())?,
    };

    set.git_artifact_mut()
        .remote
        .push(RemoteGitArtifact::new(url, branch, ssh_key_path, placement));
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AppArgs {
    name: String,
    #[serde(default)]
    body: Value,
}

fn app(eval: &mut Evaluation<'_>, set: &mut OptionSet, args: &Value) -> Result<(), Halt> {
    let args = match args {
        Value::String(name) => AppArgs {
            name: name.clone(),
            body: Value::Null,
        },
        _ => keywords::<AppArgs>("app", args)?,
    };
    if args.name.is_empty() {
        return Err(ConfigError::invalid("app", "name must not be empty").into());
    }

    let mut child = set.branch(&args.name);
    match evaluate(eval, &mut child, &args.body) {
        Ok(()) => {}
        Err(Halt::Config(error)) => {
            eval.warn(child.log_indent(), child.name(), &error);
            child.fail(error);
        }
        Err(fatal) => return Err(fatal),
    }
    set.add_app(child);
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
struct BuildDappArgs {
    #[serde(default)]
    extra_dapps: Option<OneOrMany>,
}

fn build_dapp(eval: &mut Evaluation<'_>, set: &mut OptionSet, args: &Value) -> Result<(), Halt> {
    // Positional arguments only matter to the nested build itself.
    let args = match args {
        Value::Mapping(_) => keywords::<BuildDappArgs>("build_dapp", args)?,
        _ => BuildDappArgs::default(),
    };
    let extra: Vec<String> = args.extra_dapps.map(Vec::from).unwrap_or_default();
    dappit(eval, set, &Value::Sequence(extra.into_iter().map(Value::String).collect()))
}
