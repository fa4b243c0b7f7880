//! Dapp front end
//!
//! Wires settings files and command line flags into the Dappfile interpreter
//! and the stage chain, and prints what they produce.

pub mod commands;

pub use commands::{Cli, CliError, Commands, GlobalArgs, run};
