//! The standard stage chain of one application

use std::path::Path;

use convenient_dappfile::AppSpec;
use tracing::debug;

use crate::chain::{Signature, StageChain, StageId};
use crate::error::StageResult;
use crate::stages::{DependencyFileStage, FromStage, GitArtifactStage, InstructionsStage};

/// Stage names in build order.
pub const STAGE_NAMES: [&str; 8] = [
    "from",
    "infra_install",
    "source_1_archive",
    "source_1",
    "infra_setup",
    "app_install",
    "app_setup",
    "source_5",
];

/// Stage chain built for one [`AppSpec`].
#[derive(Debug)]
pub struct Pipeline {
    app: String,
    chain: StageChain,
}

impl Pipeline {
    /// Assemble the chain for `spec`, looking for its dependency file in
    /// `build_path`.
    pub fn for_app(spec: &AppSpec, build_path: &Path) -> StageResult<Self> {
        let artifacts = spec.git_artifact();
        let mut chain = StageChain::new();

        let _ = chain.push(STAGE_NAMES[0], FromStage::new(spec.from_image()));
        let _ = chain.push(
            STAGE_NAMES[1],
            InstructionsStage::new(STAGE_NAMES[1], spec.infra_install()),
        );
        let _ = chain.push(STAGE_NAMES[2], GitArtifactStage::new(STAGE_NAMES[2], artifacts));
        let _ = chain.push(
            STAGE_NAMES[3],
            DependencyFileStage::new(build_path, spec.app_install())?,
        );
        let _ = chain.push(
            STAGE_NAMES[4],
            InstructionsStage::new(STAGE_NAMES[4], spec.infra_setup()),
        );
        let _ = chain.push(
            STAGE_NAMES[5],
            InstructionsStage::new(STAGE_NAMES[5], spec.app_install()),
        );
        let _ = chain.push(
            STAGE_NAMES[6],
            InstructionsStage::new(STAGE_NAMES[6], spec.app_setup()),
        );
        let _ = chain.push(STAGE_NAMES[7], GitArtifactStage::new(STAGE_NAMES[7], artifacts));

        debug!("Pipeline for {}: {} stages", spec.name(), chain.len());
        Ok(Self {
            app: spec.name().to_string(),
            chain,
        })
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn chain(&self) -> &StageChain {
        &self.chain
    }

    pub fn stage(&self, name: &str) -> Option<StageId> {
        self.chain.find(name)
    }

    /// Signature of the last stage, identifying the finished image.
    pub fn image_signature(&self) -> StageResult<Option<&Signature>> {
        self.chain
            .last()
            .map(|id| self.chain.signature(id))
            .transpose()
    }

    pub fn signatures(&self) -> StageResult<Vec<(&str, &Signature)>> {
        self.chain.signatures()
    }
}
