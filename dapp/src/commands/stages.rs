//! Stage signatures and rebuild status

use std::io::Write;
use std::path::Path;

use convenient_dappfile::ConfigInterpreter;
use convenient_git::SourceControl;
use convenient_stage::{Pipeline, SignatureStore};
use tracing::info;

use super::{CommandResult, apps};

pub struct StageOptions<'a> {
    pub dir: &'a Path,
    pub pattern: &'a str,
    pub build_dir: &'a Path,
    pub cache: Option<&'a Path>,
    pub record: bool,
}

/// Print every stage of every matching application as
/// `<stage> <signature> [cached|rebuild]`.
pub fn execute<S: SourceControl>(
    interpreter: &ConfigInterpreter<S>,
    options: &StageOptions<'_>,
    out: &mut impl Write,
) -> CommandResult {
    let specs = apps::resolve(interpreter, options.dir, options.pattern)?;
    let mut store = options.cache.map(SignatureStore::load).transpose()?;

    for spec in &specs {
        let pipeline = Pipeline::for_app(spec, options.build_dir)?;
        writeln!(out, "{}", pipeline.app())?;

        let mut stale = 0;
        for (stage, signature) in pipeline.signatures()? {
            match &store {
                Some(store) => {
                    let rebuild = store.needs_rebuild(pipeline.app(), stage, signature);
                    if rebuild {
                        stale += 1;
                    }
                    let status = if rebuild { "rebuild" } else { "cached" };
                    writeln!(out, "  {stage:<18} {signature} {status}")?;
                }
                None => writeln!(out, "  {stage:<18} {signature}")?,
            }
        }

        if let Some(store) = store.as_mut() {
            info!("{}: {} of {} stages stale", pipeline.app(), stale, pipeline.chain().len());
            if options.record {
                store.record_chain(pipeline.app(), pipeline.chain())?;
            }
        }
    }

    if let Some(store) = store.as_mut() {
        store.save()?;
    }
    Ok(())
}
