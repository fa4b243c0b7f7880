//! Stage chains and their signatures
//!
//! Stages live in an append-only arena and refer to their predecessor by
//! index. A stage signature is the SHA-256 of the predecessor's signature (or
//! a fixed seed for the first stage) followed by the stage's own dependency
//! inputs, in order. Changing anything upstream therefore changes every
//! signature downstream.

use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{StageError, StageResult};

/// Hashed in place of a predecessor signature by the first stage.
pub const CHAIN_SEED: &[u8] = b"dapp-stage-chain";

/// Position of a stage in its [`StageChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(usize);

impl StageId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stage({})", self.0)
    }
}

/// Hex encoded SHA-256 stage signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, enough to tell stages apart in logs.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One dependency input of a stage.
///
/// `Absent` and an empty byte string hash differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageInput {
    Absent,
    Bytes(Vec<u8>),
}

impl StageInput {
    fn feed(&self, hasher: &mut Sha256) {
        match self {
            StageInput::Absent => hasher.update([0u8]),
            StageInput::Bytes(bytes) => feed_bytes(hasher, bytes),
        }
    }
}

fn feed_bytes(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update([1u8]);
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

impl From<&str> for StageInput {
    fn from(value: &str) -> Self {
        StageInput::Bytes(value.as_bytes().to_vec())
    }
}

impl From<String> for StageInput {
    fn from(value: String) -> Self {
        StageInput::Bytes(value.into_bytes())
    }
}

impl From<Vec<u8>> for StageInput {
    fn from(value: Vec<u8>) -> Self {
        StageInput::Bytes(value)
    }
}

impl<T: Into<StageInput>> From<Option<T>> for StageInput {
    fn from(value: Option<T>) -> Self {
        value.map_or(StageInput::Absent, Into::into)
    }
}

/// Provides the inputs that make up a stage's own contribution to its
/// signature.
pub trait StageInputs: fmt::Debug + Send + Sync {
    fn dependency_inputs(&self) -> StageResult<Vec<StageInput>>;
}

/// Signature over a predecessor signature and dependency inputs.
pub fn compute_signature(previous: Option<&Signature>, inputs: &[StageInput]) -> Signature {
    let mut hasher = Sha256::new();
    match previous {
        Some(previous) => feed_bytes(&mut hasher, previous.as_str().as_bytes()),
        None => feed_bytes(&mut hasher, CHAIN_SEED),
    }
    for input in inputs {
        input.feed(&mut hasher);
    }
    Signature(format!("{:x}", hasher.finalize()))
}

#[derive(Debug)]
struct Stage {
    name: String,
    previous: Option<StageId>,
    inputs: Box<dyn StageInputs>,
    signature: OnceLock<Signature>,
}

/// Ordered, append-only chain of stages.
///
/// Once built a chain can be shared between threads; signatures are computed
/// on first request and memoized.
#[derive(Debug, Default)]
pub struct StageChain {
    stages: Vec<Stage>,
}

impl StageChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage after the current last one.
    pub fn push(&mut self, name: impl Into<String>, inputs: impl StageInputs + 'static) -> StageId {
        let id = StageId(self.stages.len());
        let previous = self.stages.len().checked_sub(1).map(StageId);
        self.stages.push(Stage {
            name: name.into(),
            previous,
            inputs: Box::new(inputs),
            signature: OnceLock::new(),
        });
        id
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage ids in chain order.
    pub fn ids(&self) -> impl Iterator<Item = StageId> + '_ {
        (0..self.stages.len()).map(StageId)
    }

    pub fn last(&self) -> Option<StageId> {
        self.stages.len().checked_sub(1).map(StageId)
    }

    pub fn find(&self, name: &str) -> Option<StageId> {
        self.stages
            .iter()
            .position(|stage| stage.name == name)
            .map(StageId)
    }

    fn stage(&self, id: StageId) -> StageResult<&Stage> {
        self.stages.get(id.0).ok_or(StageError::UnknownStage(id))
    }

    pub fn name(&self, id: StageId) -> StageResult<&str> {
        Ok(&self.stage(id)?.name)
    }

    pub fn previous(&self, id: StageId) -> StageResult<Option<StageId>> {
        Ok(self.stage(id)?.previous)
    }

    pub fn dependency_inputs(&self, id: StageId) -> StageResult<Vec<StageInput>> {
        self.stage(id)?.inputs.dependency_inputs()
    }

    /// Signature of a stage, computing its predecessors first if needed.
    pub fn signature(&self, id: StageId) -> StageResult<&Signature> {
        let stage = self.stage(id)?;
        if let Some(signature) = stage.signature.get() {
            return Ok(signature);
        }

        let previous = match stage.previous {
            Some(previous) => Some(self.signature(previous)?),
            None => None,
        };
        let inputs = stage.inputs.dependency_inputs()?;
        let signature = compute_signature(previous, &inputs);
        debug!("Stage {}: {}", stage.name, signature.short());

        Ok(stage.signature.get_or_init(|| signature))
    }

    /// `(name, signature)` of every stage in chain order.
    pub fn signatures(&self) -> StageResult<Vec<(&str, &Signature)>> {
        let mut signatures = Vec::with_capacity(self.len());
        for id in self.ids() {
            signatures.push((self.name(id)?, self.signature(id)?));
        }
        Ok(signatures)
    }
}
