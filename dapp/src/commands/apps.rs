//! List resolved applications

use std::io::Write;
use std::path::Path;

use convenient_dappfile::{AppSpec, ConfigInterpreter};
use convenient_git::SourceControl;
use tracing::info;

use super::{CommandResult, no_dappfile, print_names};

/// Resolve every application matching `pattern` below `dir`.
///
/// Fails if no Dappfile matches or any application branch failed.
pub fn resolve<S: SourceControl>(
    interpreter: &ConfigInterpreter<S>,
    dir: &Path,
    pattern: &str,
) -> CommandResult<Vec<AppSpec>> {
    if interpreter.locate_source_files(dir, pattern)?.is_empty() {
        return Err(no_dappfile(interpreter.config(), dir, pattern).into());
    }

    let specs = interpreter.process_directory(dir, pattern)?.into_result()?;
    info!("Resolved {} application(s) for '{}'", specs.len(), pattern);
    Ok(specs)
}

pub fn execute<S: SourceControl>(
    interpreter: &ConfigInterpreter<S>,
    dir: &Path,
    pattern: &str,
    json: bool,
    out: &mut impl Write,
) -> CommandResult {
    let specs = resolve(interpreter, dir, pattern)?;

    if json {
        serde_json::to_writer_pretty(&mut *out, &specs)?;
        writeln!(out)?;
        Ok(())
    } else {
        print_names(&specs, out)
    }
}
