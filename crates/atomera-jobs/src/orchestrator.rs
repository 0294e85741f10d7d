//! Drives one job through the stage sequence.
//!
//! Each loop iteration reads the committed record, runs the executor for its
//! status and commits the outcome with the version it read. The run ends at
//! `DONE` or `ERROR`. A failed stage is never retried.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{JobError, Result, StageFailure};
use crate::executor::{AffinityInput, PocketInput, StageExecutor, StageExecutors, StructureInput};
use crate::record::{JobId, JobRecord, JobStatus, Transition};
use crate::store::JobStore;

/// Optional wall-clock limits per stage. `None` waits indefinitely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTimeouts {
    pub structure: Option<Duration>,
    pub pockets: Option<Duration>,
    pub affinity: Option<Duration>,
}

pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    executors: StageExecutors,
    timeouts: StageTimeouts,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("executors", &self.executors)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl Orchestrator {
    pub fn new(store: Arc<dyn JobStore>, executors: StageExecutors) -> Self {
        Self { store, executors, timeouts: StageTimeouts::default() }
    }

    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Run `id` to a terminal status.
    ///
    /// Stage failures end up committed as `ERROR` and are returned as `Ok(JobStatus::Error)`.
    /// `Err` is reserved for store errors, most notably [`JobError::VersionConflict`].
    #[instrument(skip_all, fields(job_id = %id))]
    pub async fn run(&self, id: JobId) -> Result<JobStatus> {
        let mut first = true;
        loop {
            let record = self.store.get(id).await?;
            let transition = match record.status {
                JobStatus::Done | JobStatus::Error => {
                    if first {
                        warn!(status = %record.status, "Job already terminal, nothing to run");
                    }
                    return Ok(record.status);
                }
                JobStatus::Queued => Transition::Begin,
                JobStatus::Structure => self.structure_stage(&record).await,
                JobStatus::Pockets => self.pocket_stage(&record).await,
                JobStatus::Affinity => self.affinity_stage(&record).await,
            };
            first = false;
            self.commit(&record, transition).await?;
        }
    }

    async fn structure_stage(&self, record: &JobRecord) -> Transition {
        let input = StructureInput {
            job_id: record.id,
            protein_id: record.request.protein_id.clone(),
        };
        match invoke(self.executors.structure.clone(), input, self.timeouts.structure).await {
            Ok(structure) => {
                debug!(path = ?structure.path, source = ?structure.source, "Structure ready");
                Transition::StructureReady(structure)
            }
            Err(failure) => failed(record, failure),
        }
    }

    async fn pocket_stage(&self, record: &JobRecord) -> Transition {
        let Some(structure) = record.artifacts.structure.clone() else {
            return missing_artifact(record, "structure");
        };
        let input = PocketInput {
            job_id: record.id,
            structure,
            mode: record.request.pocket_mode,
        };
        match invoke(self.executors.pockets.clone(), input, self.timeouts.pockets).await {
            Ok(pockets) => {
                debug!(count = pockets.len(), "Pockets ready");
                Transition::PocketsReady(pockets)
            }
            Err(failure) => failed(record, failure),
        }
    }

    async fn affinity_stage(&self, record: &JobRecord) -> Transition {
        let (Some(structure), Some(pockets)) =
            (record.artifacts.structure.clone(), record.artifacts.pockets.clone())
        else {
            return missing_artifact(record, "structure or pocket");
        };
        let input = AffinityInput {
            job_id: record.id,
            structure,
            pockets,
            ligand_set_id: record.request.ligand_set_id.clone(),
            mode: record.request.affinity_mode,
        };
        match invoke(self.executors.affinity.clone(), input, self.timeouts.affinity).await {
            Ok(ligands) => {
                debug!(count = ligands.len(), "Ligands scored");
                Transition::Completed(ligands)
            }
            Err(failure) => failed(record, failure),
        }
    }

    async fn commit(&self, record: &JobRecord, transition: Transition) -> Result<u64> {
        let to = transition.target();
        match self.store.compare_and_transition(record.id, record.version, transition).await {
            Ok(version) => {
                info!(from = %record.status, to = %to, version, "Job advanced");
                Ok(version)
            }
            Err(e @ JobError::VersionConflict { .. }) => {
                error!(error = %e, "Concurrent writer detected, aborting run");
                Err(e)
            }
            Err(e) => {
                error!(error = %e, from = %record.status, to = %to, "Failed to commit transition");
                Err(e)
            }
        }
    }
}

fn failed(record: &JobRecord, failure: StageFailure) -> Transition {
    warn!(stage = %record.status, cause = %failure.cause, "Stage failed: {}", failure.message);
    Transition::Failed(failure.to_string())
}

fn missing_artifact(record: &JobRecord, what: &str) -> Transition {
    error!(stage = %record.status, "Job record is missing its {} output", what);
    Transition::Failed(format!("internal error: {} output missing at stage {}", what, record.status))
}

/// Run one executor on its own task so a panic or a timeout becomes a [`StageFailure`].
async fn invoke<I, O>(
    executor: Arc<dyn StageExecutor<Input = I, Output = O>>,
    input: I,
    limit: Option<Duration>,
) -> std::result::Result<O, StageFailure>
where
    I: Send + 'static,
    O: Send + 'static,
{
    let name = executor.name().to_string();
    let handle = tokio::spawn(async move { executor.execute(input).await });
    let abort = handle.abort_handle();

    let joined = match limit {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined,
            Err(_) => {
                abort.abort();
                return Err(StageFailure::timeout(format!("{} did not finish within {:?}", name, limit)));
            }
        },
        None => handle.await,
    };

    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(StageFailure::tool_crash(format!("{} panicked", name))),
        Err(e) => Err(StageFailure::tool_crash(format!("{} was aborted: {}", name, e))),
    }
}
