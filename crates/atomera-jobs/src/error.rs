//! Job and stage error types.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::record::{JobId, JobStatus};

pub type Result<T> = std::result::Result<T, JobError>;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job {id} is not complete (status {status})")]
    NotReady { id: JobId, status: JobStatus },

    #[error("Job {id} failed: {message}")]
    Failed { id: JobId, message: String },

    #[error("Ligand {ligand_id} not found in results of job {id}")]
    LigandNotFound { id: JobId, ligand_id: String },

    /// Two writers raced on one record. Always a defect.
    #[error("Version conflict on job {id}: expected {expected}, found {actual}")]
    VersionConflict { id: JobId, expected: u64, actual: u64 },

    #[error("Invalid transition on job {id}: {from} -> {to}")]
    InvalidTransition { id: JobId, from: JobStatus, to: JobStatus },

    #[error("Job {0} is already queued or running")]
    AlreadyDispatched(JobId),

    #[error("Scheduler is shut down")]
    SchedulerClosed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Category of a stage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    InvalidInput,
    ToolCrash,
    Timeout,
    ResourceExhausted,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureCause::InvalidInput => "invalid input",
            FailureCause::ToolCrash => "tool crash",
            FailureCause::Timeout => "timeout",
            FailureCause::ResourceExhausted => "resource exhausted",
        })
    }
}

/// Failure reported by a stage executor. Rendered as `<cause>: <message>`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{cause}: {message}")]
pub struct StageFailure {
    pub cause: FailureCause,
    pub message: String,
}

impl StageFailure {
    pub fn new(cause: FailureCause, message: impl Into<String>) -> Self {
        Self { cause, message: message.into() }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(FailureCause::InvalidInput, message)
    }

    pub fn tool_crash(message: impl Into<String>) -> Self {
        Self::new(FailureCause::ToolCrash, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureCause::Timeout, message)
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new(FailureCause::ResourceExhausted, message)
    }
}
