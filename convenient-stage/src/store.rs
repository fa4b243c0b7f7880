//! Signatures of stages that were already built
//!
//! The store is a JSON file mapping `<app>/<stage>` to the signature the
//! stage had when its layer was built. A stage whose current signature
//! differs from the recorded one has to be rebuilt.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chain::{Signature, StageChain};
use crate::error::{StageError, StageResult};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    signatures: BTreeMap<String, Signature>,
}

/// Recorded stage signatures backed by a JSON file.
#[derive(Debug)]
pub struct SignatureStore {
    path: PathBuf,
    file: StoreFile,
    dirty: bool,
}

fn key(app: &str, stage: &str) -> String {
    format!("{app}/{stage}")
}

impl SignatureStore {
    /// Load the store at `path`; a missing file is an empty store.
    pub fn load(path: impl Into<PathBuf>) -> StageResult<Self> {
        let path = path.into();
        let file = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| StageError::Store(path.clone(), e.to_string()))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No signature store at {}, starting empty", path.display());
                StoreFile::default()
            }
            Err(e) => return Err(StageError::Io(path, e)),
        };

        Ok(Self {
            path,
            file,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.file.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file.signatures.is_empty()
    }

    pub fn get(&self, app: &str, stage: &str) -> Option<&Signature> {
        self.file.signatures.get(&key(app, stage))
    }

    /// Whether the layer of `stage` cannot be reused.
    pub fn needs_rebuild(&self, app: &str, stage: &str, signature: &Signature) -> bool {
        match self.get(app, stage) {
            Some(recorded) if recorded == signature => {
                debug!("{}/{} up to date ({})", app, stage, signature.short());
                false
            }
            Some(recorded) => {
                info!(
                    "{}/{} changed: {} -> {}",
                    app,
                    stage,
                    recorded.short(),
                    signature.short()
                );
                true
            }
            None => {
                debug!("{}/{} never built", app, stage);
                true
            }
        }
    }

    pub fn record(&mut self, app: &str, stage: &str, signature: Signature) {
        if self.get(app, stage) != Some(&signature) {
            let _ = self.file.signatures.insert(key(app, stage), signature);
            self.dirty = true;
        }
    }

    /// Record every stage of `chain` under `app`.
    pub fn record_chain(&mut self, app: &str, chain: &StageChain) -> StageResult<()> {
        for (stage, signature) in chain.signatures()? {
            self.record(app, stage, signature.clone());
        }
        Ok(())
    }

    /// Write the store back if anything was recorded since loading.
    pub fn save(&mut self) -> StageResult<()> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StageError::Io(parent.to_path_buf(), e))?;
        }
        let content = serde_json::to_string_pretty(&self.file)
            .map_err(|e| StageError::Store(self.path.clone(), e.to_string()))?;
        std::fs::write(&self.path, content).map_err(|e| StageError::Io(self.path.clone(), e))?;

        info!("Saved {} signatures to {}", self.len(), self.path.display());
        self.dirty = false;
        Ok(())
    }
}
