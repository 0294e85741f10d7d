//! Job repository.
//!
//! All reads and writes of job state go through [`JobStore`]. The in-memory
//! implementation keeps one lock per record so writers on different jobs never
//! contend, and hands readers cloned snapshots of committed state only.

use async_trait::async_trait;
use atomera_common::JobRequest;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

use crate::error::{JobError, Result};
use crate::record::{JobId, JobRecord, JobStatus, Transition};

/// Committed transition, published after the write lands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobEvent {
    pub job_id: JobId,
    pub status: JobStatus,
    pub version: u64,
    pub at: DateTime<Utc>,
}

/// Job repository trait.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a fresh `QUEUED` record at version 0.
    async fn create(&self, request: JobRequest) -> JobId;

    /// Snapshot of the most recently committed state.
    async fn get(&self, id: JobId) -> Result<JobRecord>;

    /// Apply `transition` if the stored version still equals `expected_version`.
    ///
    /// Returns the new version. A stale version yields [`JobError::VersionConflict`].
    async fn compare_and_transition(
        &self,
        id: JobId,
        expected_version: u64,
        transition: Transition,
    ) -> Result<u64>;

    /// Number of records held.
    async fn len(&self) -> usize;

    /// Stream of committed transitions, in commit order per job.
    fn subscribe(&self) -> broadcast::Receiver<JobEvent>;
}

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Process-local store.
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Arc<RwLock<JobRecord>>>>,
    event_tx: broadcast::Sender<JobEvent>,
}

impl std::fmt::Debug for InMemoryJobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryJobStore")
            .field("jobs", &"<job records>")
            .field("subscribers", &self.event_tx.receiver_count())
            .finish()
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { jobs: RwLock::new(HashMap::new()), event_tx }
    }

    async fn slot(&self, id: JobId) -> Result<Arc<RwLock<JobRecord>>> {
        let jobs = self.jobs.read().await;
        jobs.get(&id).cloned().ok_or(JobError::NotFound(id))
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, request: JobRequest) -> JobId {
        let mut jobs = self.jobs.write().await;
        loop {
            let id = JobId::new();
            if let Entry::Vacant(slot) = jobs.entry(id) {
                slot.insert(Arc::new(RwLock::new(JobRecord::new(id, request))));
                debug!(job_id = %id, "Job record created");
                return id;
            }
            warn!(job_id = %id, "Job id collision, regenerating");
        }
    }

    async fn get(&self, id: JobId) -> Result<JobRecord> {
        let slot = self.slot(id).await?;
        let record = slot.read().await;
        Ok(record.clone())
    }

    async fn compare_and_transition(
        &self,
        id: JobId,
        expected_version: u64,
        transition: Transition,
    ) -> Result<u64> {
        let slot = self.slot(id).await?;
        let mut record = slot.write().await;

        if record.version != expected_version {
            return Err(JobError::VersionConflict {
                id,
                expected: expected_version,
                actual: record.version,
            });
        }

        let version = record.apply(transition)?;
        debug!(job_id = %id, status = %record.status, version, "Transition committed");

        // Sent under the record lock so subscribers see one job's events in commit order.
        let _ = self.event_tx.send(JobEvent {
            job_id: id,
            status: record.status,
            version,
            at: record.updated_at,
        });
        Ok(version)
    }

    async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_tx.subscribe()
    }
}
