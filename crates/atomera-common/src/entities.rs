/// Domain types shared by the job core and the stage executors.
/// Every payload a stage produces is a typed record; nothing here is an
/// open-ended key/value map.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::AtomeraError;

// ---------------------------------------------------------------------------
// Mode selectors
// ---------------------------------------------------------------------------

/// Pocket detection strategy. `Auto` runs the default P2Rank model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PocketMode {
    #[default]
    Auto,
    /// Model tuned for predicted (AlphaFold/ESMFold) structures.
    AlphaFold,
    /// Model that adds residue conservation features.
    Conservation,
}

impl PocketMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PocketMode::Auto => "auto",
            PocketMode::AlphaFold => "alphafold",
            PocketMode::Conservation => "conservation",
        }
    }
}

impl fmt::Display for PocketMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PocketMode {
    type Err = AtomeraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(PocketMode::Auto),
            "alphafold" => Ok(PocketMode::AlphaFold),
            "conservation" => Ok(PocketMode::Conservation),
            other => Err(AtomeraError::UnknownMode { kind: "pocket", value: other.to_string() }),
        }
    }
}

/// Affinity scoring model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AffinityMode {
    #[default]
    Boltz2,
    Vina,
}

impl AffinityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AffinityMode::Boltz2 => "boltz2",
            AffinityMode::Vina => "vina",
        }
    }

    /// Unit label attached to every score this model produces.
    pub fn affinity_type(&self) -> &'static str {
        match self {
            AffinityMode::Boltz2 => "log10(IC50)",
            AffinityMode::Vina => "kcal/mol",
        }
    }
}

impl fmt::Display for AffinityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AffinityMode {
    type Err = AtomeraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "boltz2" | "boltz-2" => Ok(AffinityMode::Boltz2),
            "vina" => Ok(AffinityMode::Vina),
            other => Err(AtomeraError::UnknownMode { kind: "affinity", value: other.to_string() }),
        }
    }
}

// ---------------------------------------------------------------------------
// Job request
// ---------------------------------------------------------------------------

/// Immutable input configuration of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Uploaded protein (FASTA sequence or PDB file) reference.
    pub protein_id: String,
    /// Uploaded ligand set directory reference.
    pub ligand_set_id: String,
    #[serde(default)]
    pub pocket_mode: PocketMode,
    #[serde(default)]
    pub affinity_mode: AffinityMode,
}

impl JobRequest {
    pub fn new(protein_id: impl Into<String>, ligand_set_id: impl Into<String>) -> Self {
        Self {
            protein_id: protein_id.into(),
            ligand_set_id: ligand_set_id.into(),
            pocket_mode: PocketMode::default(),
            affinity_mode: AffinityMode::default(),
        }
    }

    pub fn with_pocket_mode(mut self, mode: PocketMode) -> Self {
        self.pocket_mode = mode;
        self
    }

    pub fn with_affinity_mode(mut self, mode: AffinityMode) -> Self {
        self.affinity_mode = mode;
        self
    }
}

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureSource {
    /// Folded from a submitted sequence.
    Predicted,
    /// Taken as-is from an uploaded PDB file.
    Uploaded,
}

/// Reference to a folded protein structure on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureRef {
    pub path: PathBuf,
    /// One-letter amino-acid sequence, when known.
    pub sequence: Option<String>,
    pub source: StructureSource,
}

// ---------------------------------------------------------------------------
// Pockets
// ---------------------------------------------------------------------------

/// One predicted binding pocket, in rank order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PocketCandidate {
    /// 1-based rank as reported by the detector.
    pub id: u32,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    pub center: [f64; 3],
    /// Residue labels in `chain:number` form, e.g. `A:123`.
    pub residues: Vec<String>,
}

// ---------------------------------------------------------------------------
// Ligands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Bucket a binder probability: >= 0.8 High, >= 0.5 Medium, else Low.
    pub fn from_binder_prob(prob: f64) -> Self {
        if prob >= 0.8 {
            Confidence::High
        } else if prob >= 0.5 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// A scored ligand. Lower scores bind more strongly for every supported model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedLigand {
    pub ligand_id: String,
    pub score: f64,
    pub affinity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binder_prob: Option<f64>,
    pub confidence: Confidence,
    /// Predicted protein-ligand complex written by the scoring tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complex_path: Option<PathBuf>,
}

/// Sort ligands strongest binder first. NaN scores sink to the end.
pub fn rank_ligands(mut ligands: Vec<RankedLigand>) -> Vec<RankedLigand> {
    ligands.sort_by(|a, b| match (a.score.is_nan(), b.score.is_nan()) {
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        _ => a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal),
    });
    ligands
}
