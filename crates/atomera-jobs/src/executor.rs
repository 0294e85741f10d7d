//! Stage executor contract.
//!
//! An executor turns plain input data into plain output data, or a
//! [`StageFailure`]. It never sees the job record; only the orchestrator commits state.

use async_trait::async_trait;
use atomera_common::{AffinityMode, PocketCandidate, PocketMode, RankedLigand, StructureRef};
use std::sync::Arc;

use crate::error::StageFailure;
use crate::record::JobId;

/// One pipeline stage backed by an external tool.
///
/// `execute` may take anywhere from milliseconds to hours.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Tool name used in logs and failure messages.
    fn name(&self) -> &str;

    async fn execute(&self, input: Self::Input) -> Result<Self::Output, StageFailure>;
}

#[derive(Debug, Clone)]
pub struct StructureInput {
    pub job_id: JobId,
    pub protein_id: String,
}

#[derive(Debug, Clone)]
pub struct PocketInput {
    pub job_id: JobId,
    pub structure: StructureRef,
    pub mode: PocketMode,
}

#[derive(Debug, Clone)]
pub struct AffinityInput {
    pub job_id: JobId,
    pub structure: StructureRef,
    pub pockets: Vec<PocketCandidate>,
    pub ligand_set_id: String,
    pub mode: AffinityMode,
}

pub type StructureExecutor = dyn StageExecutor<Input = StructureInput, Output = StructureRef>;
pub type PocketExecutor = dyn StageExecutor<Input = PocketInput, Output = Vec<PocketCandidate>>;
pub type AffinityExecutor = dyn StageExecutor<Input = AffinityInput, Output = Vec<RankedLigand>>;

/// The three executors a pipeline run needs, in stage order.
#[derive(Clone)]
pub struct StageExecutors {
    pub structure: Arc<StructureExecutor>,
    pub pockets: Arc<PocketExecutor>,
    pub affinity: Arc<AffinityExecutor>,
}

impl StageExecutors {
    pub fn new(
        structure: Arc<StructureExecutor>,
        pockets: Arc<PocketExecutor>,
        affinity: Arc<AffinityExecutor>,
    ) -> Self {
        Self { structure, pockets, affinity }
    }
}

impl std::fmt::Debug for StageExecutors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageExecutors")
            .field("structure", &self.structure.name())
            .field("pockets", &self.pockets.name())
            .field("affinity", &self.affinity.name())
            .finish()
    }
}
