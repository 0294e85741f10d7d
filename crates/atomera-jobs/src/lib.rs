//! Atomera Jobs - orchestration core of the binding-affinity pipeline.
//!
//! A submitted job moves through three externally executed stages:
//! 1. Structure prediction
//! 2. Binding pocket detection
//! 3. Affinity scoring
//!
//! The [`store::JobStore`] owns every job record, the [`orchestrator::Orchestrator`]
//! is the only writer of a running job, and the [`scheduler::Scheduler`] bounds how
//! many runs execute at once. Pollers read snapshots through [`service::PipelineService`].

pub mod error;
pub mod record;
pub mod store;
pub mod executor;
pub mod orchestrator;
pub mod scheduler;
pub mod service;

pub use error::{FailureCause, JobError, Result, StageFailure};
pub use executor::{StageExecutor, StageExecutors};
pub use orchestrator::{Orchestrator, StageTimeouts};
pub use record::{JobId, JobRecord, JobResults, JobStatus, StageArtifacts, Transition};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use service::{JobResultSummary, JobStatusView, LigandDetail, PipelineService};
pub use store::{InMemoryJobStore, JobEvent, JobStore};
