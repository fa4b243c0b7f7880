//! Stage chains and cache invalidation
//!
//! An image is built as a chain of stages, each one a cached layer on top of
//! the previous. A stage's signature covers its own dependency inputs and the
//! signature of the stage before it, so a layer can be reused exactly when
//! its signature matches the one recorded when it was built.
//!
//! ```no_run
//! use convenient_stage::{Pipeline, SignatureStore};
//! # use convenient_dappfile::AppSpec;
//! # use std::path::Path;
//!
//! # fn example(spec: &AppSpec) -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::for_app(spec, Path::new("build"))?;
//! let store = SignatureStore::load("build/signatures.json")?;
//! for (stage, signature) in pipeline.signatures()? {
//!     if store.needs_rebuild(pipeline.app(), stage, signature) {
//!         println!("{stage} must be rebuilt");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod chain;
pub mod error;
pub mod pipeline;
pub mod stages;
pub mod store;

pub use chain::{Signature, StageChain, StageId, StageInput, StageInputs, compute_signature};
pub use error::{StageError, StageResult};
pub use pipeline::{Pipeline, STAGE_NAMES};
pub use stages::{
    DEPENDENCY_FILE_PATTERN, DependencyFileStage, FromStage, GitArtifactStage, InstructionsStage,
};
pub use store::SignatureStore;
