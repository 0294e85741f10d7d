//! Inbound surface of the core: submit, status, results.
//!
//! Reads go straight to the store and never touch a running orchestrator.

use atomera_common::{JobRequest, PocketCandidate, RankedLigand};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::error::{JobError, Result};
use crate::executor::StageExecutors;
use crate::orchestrator::{Orchestrator, StageTimeouts};
use crate::record::{JobId, JobRecord, JobResults, JobStatus, Transition};
use crate::scheduler::{Scheduler, SchedulerConfig};
use crate::store::{JobEvent, JobStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatusView {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobResultSummary {
    pub job_id: JobId,
    pub ranked_ligands: Vec<RankedLigand>,
    pub pockets: Vec<PocketCandidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LigandDetail {
    pub job_id: JobId,
    /// 1-based position in the ranking.
    pub rank: usize,
    pub ligand: RankedLigand,
    /// Highest ranked pocket, the one scoring was constrained to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pocket: Option<PocketCandidate>,
}

pub struct PipelineService {
    store: Arc<dyn JobStore>,
    scheduler: Scheduler,
}

impl std::fmt::Debug for PipelineService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineService").field("scheduler", &self.scheduler).finish()
    }
}

impl PipelineService {
    /// Wire store, orchestrator and scheduler together. Must be called inside a tokio runtime.
    pub fn new(
        store: Arc<dyn JobStore>,
        executors: StageExecutors,
        timeouts: StageTimeouts,
        config: SchedulerConfig,
    ) -> Result<Self> {
        let orchestrator = Arc::new(Orchestrator::new(store.clone(), executors).with_timeouts(timeouts));
        let scheduler = Scheduler::start(orchestrator, config)?;
        Ok(Self { store, scheduler })
    }

    /// Create a `QUEUED` job and hand it to the scheduler.
    pub async fn submit(&self, request: JobRequest) -> Result<JobId> {
        let id = self.store.create(request).await;
        if let Err(e) = self.scheduler.dispatch(id) {
            error!(job_id = %id, error = %e, "Could not dispatch job");
            let _ = self
                .store
                .compare_and_transition(id, 0, Transition::Failed("scheduler unavailable".to_string()))
                .await;
            return Err(e);
        }
        info!(job_id = %id, "Job submitted");
        Ok(id)
    }

    pub async fn status(&self, id: JobId) -> Result<JobStatusView> {
        let record = self.store.get(id).await?;
        Ok(JobStatusView {
            job_id: record.id,
            status: record.status,
            message: record.message,
            created_at: record.created_at,
        })
    }

    /// Results of a `DONE` job. `NotReady` while it runs, `Failed` after `ERROR`.
    pub async fn results(&self, id: JobId) -> Result<JobResultSummary> {
        let results = finished_results(self.store.get(id).await?)?;
        Ok(JobResultSummary {
            job_id: id,
            ranked_ligands: results.ranked_ligands,
            pockets: results.pockets,
        })
    }

    pub async fn ligand_detail(&self, id: JobId, ligand_id: &str) -> Result<LigandDetail> {
        let results = finished_results(self.store.get(id).await?)?;
        let (index, ligand) = results
            .ranked_ligands
            .into_iter()
            .enumerate()
            .find(|(_, l)| l.ligand_id == ligand_id)
            .ok_or_else(|| JobError::LigandNotFound { id, ligand_id: ligand_id.to_string() })?;
        Ok(LigandDetail {
            job_id: id,
            rank: index + 1,
            ligand,
            pocket: results.pockets.into_iter().next(),
        })
    }

    /// Committed transitions of every job.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.store.subscribe()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn store(&self) -> Arc<dyn JobStore> {
        self.store.clone()
    }

    /// Stop intake and wait for every submitted job to reach a terminal status.
    pub async fn shutdown(self) {
        self.scheduler.shutdown().await;
    }
}

fn finished_results(record: JobRecord) -> Result<JobResults> {
    match record.status {
        JobStatus::Done => record.results.ok_or_else(|| JobError::NotReady { id: record.id, status: record.status }),
        JobStatus::Error => Err(JobError::Failed {
            id: record.id,
            message: record.message.unwrap_or_default(),
        }),
        status => Err(JobError::NotReady { id: record.id, status }),
    }
}
