//! Job record and the stage state machine.

use atomera_common::{JobRequest, PocketCandidate, RankedLigand, StructureRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{JobError, Result};

/// Opaque job handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ── Status ────────────────────────────────────────────────────────────────────

/// Position of a job in the pipeline.
///
/// Statuses only move forward along `Queued -> Structure -> Pockets -> Affinity -> Done`,
/// or from any non-terminal status to `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Structure,
    Pockets,
    Affinity,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Structure => "STRUCTURE",
            JobStatus::Pockets => "POCKETS",
            JobStatus::Affinity => "AFFINITY",
            JobStatus::Done => "DONE",
            JobStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Payloads ──────────────────────────────────────────────────────────────────

/// User-visible output of a finished job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResults {
    pub ranked_ligands: Vec<RankedLigand>,
    pub pockets: Vec<PocketCandidate>,
}

/// Stage outputs carried forward as input to the next stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageArtifacts {
    pub structure: Option<StructureRef>,
    pub pockets: Option<Vec<PocketCandidate>>,
}

/// One state change requested by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Dispatch picked the job up.
    Begin,
    StructureReady(StructureRef),
    PocketsReady(Vec<PocketCandidate>),
    Completed(Vec<RankedLigand>),
    Failed(String),
}

impl Transition {
    pub fn target(&self) -> JobStatus {
        match self {
            Transition::Begin => JobStatus::Structure,
            Transition::StructureReady(_) => JobStatus::Pockets,
            Transition::PocketsReady(_) => JobStatus::Affinity,
            Transition::Completed(_) => JobStatus::Done,
            Transition::Failed(_) => JobStatus::Error,
        }
    }
}

// ── Record ────────────────────────────────────────────────────────────────────

/// Authoritative state of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub request: JobRequest,
    pub message: Option<String>,
    pub results: Option<JobResults>,
    #[serde(default)]
    pub artifacts: StageArtifacts,
    pub version: u64,
}

impl JobRecord {
    pub fn new(id: JobId, request: JobRequest) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Queued,
            created_at: now,
            updated_at: now,
            request,
            message: None,
            results: None,
            artifacts: StageArtifacts::default(),
            version: 0,
        }
    }

    /// Apply `transition` and bump the version.
    ///
    /// The record is left untouched when the state machine forbids the move.
    pub fn apply(&mut self, transition: Transition) -> Result<u64> {
        let from = self.status;
        let to = transition.target();
        match (from, transition) {
            (JobStatus::Queued, Transition::Begin) => {}
            (JobStatus::Structure, Transition::StructureReady(structure)) => {
                self.artifacts.structure = Some(structure);
            }
            (JobStatus::Pockets, Transition::PocketsReady(pockets)) => {
                self.artifacts.pockets = Some(pockets);
            }
            (JobStatus::Affinity, Transition::Completed(ranked_ligands)) => {
                let pockets = self.artifacts.pockets.take().unwrap_or_default();
                self.results = Some(JobResults { ranked_ligands, pockets });
            }
            (status, Transition::Failed(message)) if !status.is_terminal() => {
                self.message = Some(message);
            }
            _ => return Err(JobError::InvalidTransition { id: self.id, from, to }),
        }
        self.status = to;
        self.version += 1;
        self.updated_at = Utc::now();
        Ok(self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atomera_common::{Confidence, StructureSource};
    use std::path::PathBuf;

    fn record() -> JobRecord {
        JobRecord::new(JobId::new(), JobRequest::new("P1", "L1"))
    }

    fn structure() -> StructureRef {
        StructureRef { path: PathBuf::from("p1.pdb"), sequence: None, source: StructureSource::Uploaded }
    }

    fn pocket(id: u32, score: f64) -> PocketCandidate {
        PocketCandidate { id, score, probability: None, center: [0.0; 3], residues: vec![] }
    }

    #[test]
    fn test_success_path_moves_forward() {
        let mut rec = record();
        assert_eq!(rec.apply(Transition::Begin).unwrap(), 1);
        assert_eq!(rec.apply(Transition::StructureReady(structure())).unwrap(), 2);
        assert_eq!(rec.apply(Transition::PocketsReady(vec![pocket(1, 0.95)])).unwrap(), 3);
        assert!(rec.results.is_none());

        let ligand = RankedLigand {
            ligand_id: "lig_1".to_string(),
            score: -9.5,
            affinity_type: "log10(IC50)".to_string(),
            binder_prob: Some(0.98),
            confidence: Confidence::High,
            complex_path: None,
        };
        assert_eq!(rec.apply(Transition::Completed(vec![ligand])).unwrap(), 4);
        assert_eq!(rec.status, JobStatus::Done);
        let results = rec.results.as_ref().unwrap();
        assert_eq!(results.pockets, vec![pocket(1, 0.95)]);
        assert_eq!(results.ranked_ligands.len(), 1);
        assert!(rec.message.is_none());
    }

    #[test]
    fn test_skipping_a_stage_is_rejected() {
        let mut rec = record();
        let before = rec.clone();
        let err = rec.apply(Transition::PocketsReady(vec![])).unwrap_err();
        assert!(matches!(
            err,
            JobError::InvalidTransition { from: JobStatus::Queued, to: JobStatus::Affinity, .. }
        ));
        assert_eq!(rec, before);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut rec = record();
        rec.apply(Transition::Begin).unwrap();
        rec.apply(Transition::Failed("timeout: esmfold".to_string())).unwrap();
        assert_eq!(rec.status, JobStatus::Error);
        assert_eq!(rec.message.as_deref(), Some("timeout: esmfold"));
        assert!(rec.apply(Transition::Failed("again".to_string())).is_err());
        assert!(rec.apply(Transition::Begin).is_err());
        assert_eq!(rec.version, 2);
        assert!(rec.results.is_none());
    }

    #[test]
    fn test_queued_job_can_fail_directly() {
        let mut rec = record();
        rec.apply(Transition::Failed("invalid input: empty request".to_string())).unwrap();
        assert_eq!(rec.status, JobStatus::Error);
    }

    #[test]
    fn test_status_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&JobStatus::Affinity).unwrap(), "\"AFFINITY\"");
        assert!(JobStatus::Error.is_terminal());
        assert!(!JobStatus::Affinity.is_terminal());
    }
}
