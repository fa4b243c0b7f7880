//! Progress log of Dappfile processing.
//!
//! Lines are indented by nesting depth and go through `tracing` at INFO, so
//! the front end decides where they end up.

use serde::{Deserialize, Serialize};
use tracing::info;

/// Verbosity switches handed down from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogOptions {
    #[serde(default)]
    pub quiet: bool,
    #[serde(default)]
    pub verbose: bool,
}

impl LogOptions {
    pub fn enabled(&self) -> bool {
        self.verbose || !self.quiet
    }

    pub fn log(&self, indent: usize, message: &str) {
        if self.enabled() {
            info!("{}", format_line(indent, message));
        }
    }
}

pub fn format_line(indent: usize, message: &str) -> String {
    format!("{} * {}", " ".repeat(indent), message)
}
