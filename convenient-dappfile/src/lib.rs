//! Dappfile interpretation
//!
//! A Dappfile declares one or more applications. Nested `app` blocks inherit
//! everything their parent declared so far and add to it; only the leaves of
//! that tree are built. This crate evaluates Dappfiles and hands back one
//! immutable [`AppSpec`] per leaf application:
//!
//! ```no_run
//! use convenient_dappfile::{ConfigInterpreter, DappConfig};
//! use convenient_git::Git2SourceControl;
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let interpreter = ConfigInterpreter::new(DappConfig::default(), Git2SourceControl);
//! let specs = interpreter
//!     .process_directory(Path::new("."), "proj")?
//!     .into_result()?;
//! for spec in &specs {
//!     println!("{}", spec.name());
//! }
//! # Ok(())
//! # }
//! ```

pub mod directives;
pub mod error;
pub mod git_artifact;
pub mod interlayer;
pub mod interpreter;
pub mod log;
pub mod option_set;
pub mod settings;

pub use error::{BranchFailure, ConfigError, DappfileError, Result};
pub use git_artifact::{ArtifactPlacement, GitArtifacts, LocalGitArtifact, RemoteGitArtifact};
pub use interlayer::{Period, interlayer_period};
pub use interpreter::ConfigInterpreter;
pub use log::LogOptions;
pub use option_set::{AppSpec, OptionSet, Resolution};
pub use settings::{AppType, ConfigLayer, DappConfig};
