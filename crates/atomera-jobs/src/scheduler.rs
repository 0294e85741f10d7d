//! Bounded dispatch of pipeline runs.
//!
//! Job ids enter a FIFO channel. A single dispatcher task takes them in order,
//! waits for a free slot on the semaphore and spawns one orchestrator run per job.
//! The permit is held for the whole run, so at most `max_concurrent_jobs` runs
//! execute at once and the rest wait in the backlog. An id is accepted again
//! only once its previous run has finished.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::error::{JobError, Result};
use crate::orchestrator::Orchestrator;
use crate::record::JobId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

fn default_max_concurrent_jobs() -> usize { 4 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_concurrent_jobs: default_max_concurrent_jobs() }
    }
}

pub struct Scheduler {
    tx: mpsc::UnboundedSender<JobId>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    backlog: Arc<AtomicUsize>,
    active: ActiveJobs,
    dispatcher: JoinHandle<()>,
}

/// Ids that are queued or running.
#[derive(Debug, Clone, Default)]
struct ActiveJobs(Arc<Mutex<HashSet<JobId>>>);

impl ActiveJobs {
    /// `false` if `id` is already active.
    fn claim(&self, id: JobId) -> bool {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).insert(id)
    }

    fn release(&self, id: JobId) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).remove(&id);
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("max_concurrent", &self.max_concurrent)
            .field("running", &self.running())
            .field("backlog", &self.backlog())
            .finish()
    }
}

impl Scheduler {
    /// Spawn the dispatcher. Must be called inside a tokio runtime.
    pub fn start(orchestrator: Arc<Orchestrator>, config: SchedulerConfig) -> Result<Self> {
        if config.max_concurrent_jobs == 0 {
            return Err(JobError::InvalidConfig(
                "scheduler.max_concurrent_jobs must be at least 1".to_string(),
            ));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let permits = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let backlog = Arc::new(AtomicUsize::new(0));
        let active = ActiveJobs::default();
        let dispatcher = tokio::spawn(dispatch_loop(
            orchestrator,
            rx,
            permits.clone(),
            backlog.clone(),
            active.clone(),
        ));

        info!("Scheduler started with {} concurrent slots", config.max_concurrent_jobs);
        Ok(Self {
            tx,
            permits,
            max_concurrent: config.max_concurrent_jobs,
            backlog,
            active,
            dispatcher,
        })
    }

    /// Queue `id` for execution. Returns without waiting for the run to start.
    ///
    /// Fails with [`JobError::AlreadyDispatched`] while an earlier dispatch of `id`
    /// is still queued or running.
    pub fn dispatch(&self, id: JobId) -> Result<()> {
        if !self.active.claim(id) {
            warn!(job_id = %id, "Job is already queued or running, ignoring dispatch");
            return Err(JobError::AlreadyDispatched(id));
        }
        self.backlog.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(id).is_err() {
            self.backlog.fetch_sub(1, Ordering::SeqCst);
            self.active.release(id);
            return Err(JobError::SchedulerClosed);
        }
        debug!(job_id = %id, "Job dispatched");
        Ok(())
    }

    /// Runs currently holding a slot.
    pub fn running(&self) -> usize {
        self.max_concurrent - self.permits.available_permits()
    }

    /// Jobs dispatched but not yet started.
    pub fn backlog(&self) -> usize {
        self.backlog.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Stop accepting jobs and wait until every dispatched job has finished.
    pub async fn shutdown(self) {
        let Scheduler { tx, dispatcher, .. } = self;
        drop(tx);
        if let Err(e) = dispatcher.await {
            error!("Scheduler dispatcher terminated abnormally: {}", e);
        }
        info!("Scheduler stopped");
    }
}

async fn dispatch_loop(
    orchestrator: Arc<Orchestrator>,
    mut rx: mpsc::UnboundedReceiver<JobId>,
    permits: Arc<Semaphore>,
    backlog: Arc<AtomicUsize>,
    active: ActiveJobs,
) {
    let mut runs: JoinSet<()> = JoinSet::new();

    while let Some(id) = rx.recv().await {
        let permit = match permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                error!(job_id = %id, "Scheduler semaphore closed, dropping job");
                active.release(id);
                break;
            }
        };
        backlog.fetch_sub(1, Ordering::SeqCst);

        let orchestrator = orchestrator.clone();
        let active = active.clone();
        runs.spawn(async move {
            let _permit = permit;
            match orchestrator.run(id).await {
                Ok(status) => debug!(job_id = %id, status = %status, "Run finished"),
                Err(e) => error!(job_id = %id, error = %e, "Run aborted"),
            }
            active.release(id);
        });

        while let Some(finished) = runs.try_join_next() {
            log_join(finished);
        }
    }

    while let Some(finished) = runs.join_next().await {
        log_join(finished);
    }
}

fn log_join(finished: std::result::Result<(), JoinError>) {
    if let Err(e) = finished {
        error!("Pipeline run task failed: {}", e);
    }
}
