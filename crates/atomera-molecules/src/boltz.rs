//! Affinity prediction using Boltz-2.
//!
//! Each SMILES ligand becomes one Boltz input YAML with the protein as chain `A`,
//! the ligand as chain `B`, a pocket constraint built from the top-ranked pocket,
//! and an affinity property request on the ligand.

use async_trait::async_trait;
use atomera_common::entities::rank_ligands;
use atomera_common::{AffinityMode, Confidence, PocketCandidate, RankedLigand};
use atomera_jobs::executor::AffinityInput;
use atomera_jobs::{StageExecutor, StageFailure};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::process::{io_failure, run_tool};
use crate::uploads::UploadLayout;

const PROTEIN_CHAIN: &str = "A";
const LIGAND_CHAIN: &str = "B";
const INPUT_DIR: &str = "inputs";

// ── Input document ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct BoltzInput {
    version: u32,
    sequences: Vec<SequenceEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    constraints: Vec<Constraint>,
    properties: Vec<Property>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum SequenceEntry {
    Protein {
        id: String,
        sequence: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        msa: Option<String>,
    },
    Ligand {
        id: String,
        smiles: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum Constraint {
    Pocket {
        binder: String,
        contacts: Vec<(String, u32)>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum Property {
    Affinity { binder: String },
}

/// `affinity_<name>.json` as written by `boltz predict`.
#[derive(Debug, Deserialize)]
struct AffinityOutput {
    affinity_pred_value: f64,
    #[serde(default)]
    affinity_probability_binary: Option<f64>,
}

fn build_input(sequence: &str, smiles: &str, pocket: Option<&PocketCandidate>, use_msa_server: bool) -> BoltzInput {
    let contacts = pocket.map(pocket_contacts).unwrap_or_default();
    let constraints = if contacts.is_empty() {
        Vec::new()
    } else {
        vec![Constraint::Pocket { binder: LIGAND_CHAIN.to_string(), contacts }]
    };

    BoltzInput {
        version: 1,
        sequences: vec![
            SequenceEntry::Protein {
                id: PROTEIN_CHAIN.to_string(),
                sequence: sequence.to_string(),
                // Single-sequence mode unless the MSA server is used.
                msa: (!use_msa_server).then(|| "empty".to_string()),
            },
            SequenceEntry::Ligand { id: LIGAND_CHAIN.to_string(), smiles: smiles.to_string() },
        ],
        constraints,
        properties: vec![Property::Affinity { binder: LIGAND_CHAIN.to_string() }],
    }
}

/// Residues of the predicted protein chain, as `(chain, residue number)` contacts.
fn pocket_contacts(pocket: &PocketCandidate) -> Vec<(String, u32)> {
    pocket
        .residues
        .iter()
        .filter_map(|r| r.split_once(':'))
        .filter(|(chain, _)| *chain == PROTEIN_CHAIN)
        .filter_map(|(chain, number)| number.parse().ok().map(|n| (chain.to_string(), n)))
        .collect()
}

/// Boltz uses the input file stem as the record name. The position prefix keeps
/// names distinct when sanitising maps two ids onto the same text.
fn record_name(position: usize, ligand_id: &str) -> String {
    let safe: String = ligand_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}_{}", position + 1, safe)
}

// ── Runner ──────────────────────────────────────────────────────────────────

/// Wrapper for `boltz predict` execution.
pub struct Boltz2Runner {
    executable_path: PathBuf,
    uploads: UploadLayout,
    work_dir: PathBuf,
    use_msa_server: bool,
}

impl Boltz2Runner {
    pub fn new<P: AsRef<Path>, W: AsRef<Path>>(executable_path: P, uploads: UploadLayout, work_dir: W) -> Self {
        Self {
            executable_path: executable_path.as_ref().to_path_buf(),
            uploads,
            work_dir: work_dir.as_ref().to_path_buf(),
            use_msa_server: false,
        }
    }

    pub fn with_msa_server(mut self, enabled: bool) -> Self {
        self.use_msa_server = enabled;
        self
    }

    async fn read_prediction(&self, predictions: &Path, ligand_id: &str, name: &str) -> Result<RankedLigand, StageFailure> {
        let dir = predictions.join(name);
        let json_path = dir.join(format!("affinity_{}.json", name));
        let text = fs::read_to_string(&json_path)
            .await
            .map_err(|e| StageFailure::tool_crash(format!("Boltz affinity output missing for {}: {}", ligand_id, e)))?;
        let parsed: AffinityOutput = serde_json::from_str(&text)
            .map_err(|e| StageFailure::tool_crash(format!("unreadable Boltz affinity output for {}: {}", ligand_id, e)))?;

        let complex = dir.join(format!("{}_model_0.cif", name));
        let complex_path = fs::try_exists(&complex).await.unwrap_or(false).then_some(complex);
        Ok(RankedLigand {
            ligand_id: ligand_id.to_string(),
            score: parsed.affinity_pred_value,
            affinity_type: AffinityMode::Boltz2.affinity_type().to_string(),
            binder_prob: parsed.affinity_probability_binary,
            confidence: Confidence::from_binder_prob(parsed.affinity_probability_binary.unwrap_or(0.0)),
            complex_path,
        })
    }
}

#[async_trait]
impl StageExecutor for Boltz2Runner {
    type Input = AffinityInput;
    type Output = Vec<RankedLigand>;

    fn name(&self) -> &str {
        "boltz2"
    }

    async fn execute(&self, input: AffinityInput) -> Result<Vec<RankedLigand>, StageFailure> {
        let sequence = input
            .structure
            .sequence
            .as_deref()
            .ok_or_else(|| StageFailure::invalid_input("Boltz-2 needs the protein sequence"))?;
        let ligands = self.uploads.ligands(&input.ligand_set_id).await?;
        let pocket = input.pockets.first();
        if pocket.is_none() {
            warn!("No pocket for job {}, Boltz-2 runs unconstrained", input.job_id);
        }

        let job_dir = self.work_dir.join(input.job_id.to_string()).join("boltz");
        let input_dir = job_dir.join(INPUT_DIR);
        fs::create_dir_all(&input_dir).await.map_err(|e| io_failure("creating Boltz input directory", e))?;

        let mut names = Vec::with_capacity(ligands.len());
        for (position, ligand) in ligands.iter().enumerate() {
            let smiles = ligand.smiles.as_deref().ok_or_else(|| {
                StageFailure::invalid_input(format!("ligand {} has no SMILES, Boltz-2 cannot score it", ligand.id))
            })?;
            let doc = build_input(sequence, smiles, pocket, self.use_msa_server);
            let yaml = serde_yaml::to_string(&doc)
                .map_err(|e| StageFailure::tool_crash(format!("failed to encode Boltz input: {}", e)))?;
            let name = record_name(position, &ligand.id);
            fs::write(input_dir.join(format!("{}.yaml", name)), yaml)
                .await
                .map_err(|e| io_failure("writing Boltz input", e))?;
            names.push((ligand.id.clone(), name));
        }

        info!("Running Boltz-2 on {} ligands for job {}", names.len(), input.job_id);
        let mut command = Command::new(&self.executable_path);
        command.arg("predict").arg(&input_dir).arg("--out_dir").arg(&job_dir);
        if self.use_msa_server {
            command.arg("--use_msa_server");
        }
        run_tool("boltz", &mut command).await?;

        let predictions = job_dir.join(format!("boltz_results_{}", INPUT_DIR)).join("predictions");
        let mut scored = Vec::with_capacity(names.len());
        for (ligand_id, name) in &names {
            scored.push(self.read_prediction(&predictions, ligand_id, name).await?);
        }
        debug!("Boltz-2 scored {} ligands", scored.len());
        Ok(rank_ligands(scored))
    }
}
