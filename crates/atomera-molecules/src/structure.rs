//! Structure stage: ESMFold prediction for sequences, pass-through for uploaded PDB files.

use async_trait::async_trait;
use atomera_common::{StructureRef, StructureSource};
use atomera_jobs::executor::StructureInput;
use atomera_jobs::{StageExecutor, StageFailure};
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::pdb;
use crate::process::io_failure;
use crate::uploads::{ProteinUpload, UploadLayout};

pub const DEFAULT_ESMFOLD_URL: &str = "https://api.esmatlas.com/foldSequence/v1/pdb/";

/// Client for an ESMFold folding endpoint that takes a raw sequence body and returns PDB text.
pub struct EsmFoldClient {
    client: Client,
    endpoint: String,
    uploads: UploadLayout,
    work_dir: PathBuf,
    max_sequence_length: usize,
}

impl EsmFoldClient {
    pub fn new<P: AsRef<Path>>(
        endpoint: impl Into<String>,
        uploads: UploadLayout,
        work_dir: P,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            uploads,
            work_dir: work_dir.as_ref().to_path_buf(),
            max_sequence_length: usize::MAX,
        })
    }

    pub fn with_max_sequence_length(mut self, max: usize) -> Self {
        self.max_sequence_length = max;
        self
    }

    async fn fold(&self, input: &StructureInput, sequence: String) -> Result<StructureRef, StageFailure> {
        if sequence.len() > self.max_sequence_length {
            return Err(StageFailure::invalid_input(format!(
                "sequence has {} residues, limit is {}",
                sequence.len(),
                self.max_sequence_length
            )));
        }

        info!("Folding {} residues with ESMFold for job {}", sequence.len(), input.job_id);
        let response = self
            .client
            .post(&self.endpoint)
            .body(sequence.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StageFailure::timeout(format!("esmfold request timed out: {}", e))
                } else {
                    StageFailure::tool_crash(format!("esmfold request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StageFailure::tool_crash(format!("esmfold response unreadable: {}", e)))?;
        if let Some(failure) = status_failure(status, &body) {
            return Err(failure);
        }
        if !body.lines().any(|l| l.starts_with("ATOM")) {
            return Err(StageFailure::tool_crash("esmfold returned no atoms"));
        }

        let dir = self.work_dir.join(input.job_id.to_string());
        fs::create_dir_all(&dir).await.map_err(|e| io_failure("creating job directory", e))?;
        let path = dir.join("structure.pdb");
        fs::write(&path, body).await.map_err(|e| io_failure("writing predicted structure", e))?;

        debug!("ESMFold structure written to {:?}", path);
        Ok(StructureRef { path, sequence: Some(sequence), source: StructureSource::Predicted })
    }
}

fn status_failure(status: StatusCode, body: &str) -> Option<StageFailure> {
    if status.is_success() {
        return None;
    }
    let detail = body.lines().next().unwrap_or_default().trim();
    Some(match status {
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
            StageFailure::resource_exhausted(format!("esmfold is overloaded ({}): {}", status, detail))
        }
        StatusCode::GATEWAY_TIMEOUT | StatusCode::REQUEST_TIMEOUT => {
            StageFailure::timeout(format!("esmfold timed out ({})", status))
        }
        s if s.is_client_error() => {
            StageFailure::invalid_input(format!("esmfold rejected the sequence ({}): {}", status, detail))
        }
        _ => StageFailure::tool_crash(format!("esmfold failed ({}): {}", status, detail)),
    })
}

/// Use an uploaded PDB as the structure, reading its first chain's sequence.
pub async fn uploaded_structure(path: PathBuf) -> Result<StructureRef, StageFailure> {
    let text = fs::read_to_string(&path).await.map_err(|e| io_failure("reading uploaded structure", e))?;
    let chains = pdb::chain_sequences(&text).map_err(|e| StageFailure::invalid_input(e.to_string()))?;
    if chains.len() > 1 {
        warn!("{:?} has {} chains, using chain {} for scoring", path, chains.len(), chains[0].chain);
    }
    let sequence = chains.into_iter().next().map(|c| c.sequence);
    Ok(StructureRef { path, sequence, source: StructureSource::Uploaded })
}

#[async_trait]
impl StageExecutor for EsmFoldClient {
    type Input = StructureInput;
    type Output = StructureRef;

    fn name(&self) -> &str {
        "esmfold"
    }

    async fn execute(&self, input: StructureInput) -> Result<StructureRef, StageFailure> {
        match self.uploads.protein(&input.protein_id).await? {
            ProteinUpload::Structure(path) => {
                info!("Using uploaded structure {:?} for job {}", path, input.job_id);
                uploaded_structure(path).await
            }
            ProteinUpload::Sequence { sequence, .. } => self.fold(&input, sequence).await,
        }
    }
}
