//! Resolve a single Dappfile

use std::io::Write;
use std::path::Path;

use convenient_dappfile::ConfigInterpreter;
use convenient_git::SourceControl;

use super::{CommandResult, print_names};

pub fn execute<S: SourceControl>(
    interpreter: &ConfigInterpreter<S>,
    path: &Path,
    filter: Option<&str>,
    out: &mut impl Write,
) -> CommandResult {
    let specs = interpreter.process_file(path, filter)?.into_result()?;
    print_names(&specs, out)
}
