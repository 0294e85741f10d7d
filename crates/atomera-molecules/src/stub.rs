//! Canned executors for running the pipeline without the external tools.
//!
//! Outputs match what the demo backend returns: two pockets and two ranked ligands.

use async_trait::async_trait;
use atomera_common::{Confidence, PocketCandidate, RankedLigand, StructureRef, StructureSource};
use atomera_jobs::executor::{AffinityInput, PocketInput, StructureInput};
use atomera_jobs::{StageExecutor, StageFailure};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

async fn simulate(stage: &str, latency: Duration) {
    debug!("Simulating {} for {:?}", stage, latency);
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

pub struct StubStructure {
    work_dir: PathBuf,
    latency: Duration,
}

impl StubStructure {
    pub fn new(work_dir: impl Into<PathBuf>, latency: Duration) -> Self {
        Self { work_dir: work_dir.into(), latency }
    }
}

#[async_trait]
impl StageExecutor for StubStructure {
    type Input = StructureInput;
    type Output = StructureRef;

    fn name(&self) -> &str {
        "stub-structure"
    }

    async fn execute(&self, input: StructureInput) -> Result<StructureRef, StageFailure> {
        simulate("structure prediction", self.latency).await;
        Ok(StructureRef {
            path: self.work_dir.join(input.job_id.to_string()).join("structure.pdb"),
            sequence: None,
            source: StructureSource::Predicted,
        })
    }
}

pub struct StubPockets {
    latency: Duration,
}

impl StubPockets {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

pub fn canned_pockets() -> Vec<PocketCandidate> {
    vec![
        PocketCandidate {
            id: 1,
            score: 0.95,
            probability: Some(0.95),
            center: [10.0, 15.5, 20.0],
            residues: vec!["A:123".into(), "A:124".into(), "A:126".into()],
        },
        PocketCandidate {
            id: 2,
            score: 0.82,
            probability: Some(0.82),
            center: [-5.0, 10.0, 5.0],
            residues: vec!["A:45".into(), "A:46".into()],
        },
    ]
}

#[async_trait]
impl StageExecutor for StubPockets {
    type Input = PocketInput;
    type Output = Vec<PocketCandidate>;

    fn name(&self) -> &str {
        "stub-pockets"
    }

    async fn execute(&self, _input: PocketInput) -> Result<Vec<PocketCandidate>, StageFailure> {
        simulate("pocket detection", self.latency).await;
        Ok(canned_pockets())
    }
}

pub struct StubAffinity {
    latency: Duration,
}

impl StubAffinity {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl StageExecutor for StubAffinity {
    type Input = AffinityInput;
    type Output = Vec<RankedLigand>;

    fn name(&self) -> &str {
        "stub-affinity"
    }

    async fn execute(&self, input: AffinityInput) -> Result<Vec<RankedLigand>, StageFailure> {
        simulate("affinity scoring", self.latency).await;
        let affinity_type = input.mode.affinity_type().to_string();
        Ok(vec![
            RankedLigand {
                ligand_id: "lig_1".to_string(),
                score: -9.5,
                affinity_type: affinity_type.clone(),
                binder_prob: Some(0.98),
                confidence: Confidence::High,
                complex_path: None,
            },
            RankedLigand {
                ligand_id: "lig_2".to_string(),
                score: -7.2,
                affinity_type,
                binder_prob: Some(0.65),
                confidence: Confidence::Medium,
                complex_path: None,
            },
        ])
    }
}
