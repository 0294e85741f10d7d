//! Molecular docking using AutoDock Vina.

use async_trait::async_trait;
use atomera_common::entities::rank_ligands;
use atomera_common::{AffinityMode, AtomeraError, Confidence, RankedLigand};
use atomera_jobs::executor::AffinityInput;
use atomera_jobs::{StageExecutor, StageFailure};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use crate::process::{io_failure, run_tool};
use crate::uploads::UploadLayout;

/// Configuration for a docking run.
#[derive(Debug, Clone)]
pub struct DockingConfig {
    pub receptor: PathBuf,
    pub ligand: PathBuf,
    pub center: [f64; 3],
    pub size: [f64; 3],
    pub exhaustiveness: u32,
    pub out: PathBuf,
}

impl DockingConfig {
    fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--receptor".to_string(),
            self.receptor.display().to_string(),
            "--ligand".to_string(),
            self.ligand.display().to_string(),
        ];
        for (axis, (c, s)) in ["x", "y", "z"].iter().zip(self.center.iter().zip(self.size.iter())) {
            args.push(format!("--center_{}", axis));
            args.push(c.to_string());
            args.push(format!("--size_{}", axis));
            args.push(s.to_string());
        }
        args.push("--exhaustiveness".to_string());
        args.push(self.exhaustiveness.to_string());
        args.push("--out".to_string());
        args.push(self.out.display().to_string());
        args
    }
}

/// Wrapper for AutoDock Vina execution.
pub struct VinaRunner {
    executable_path: PathBuf,
    uploads: UploadLayout,
    work_dir: PathBuf,
    box_size: [f64; 3],
    exhaustiveness: u32,
}

impl VinaRunner {
    /// Create a new VinaRunner.
    pub fn new<P: AsRef<Path>, W: AsRef<Path>>(executable_path: P, uploads: UploadLayout, work_dir: W) -> Self {
        Self {
            executable_path: executable_path.as_ref().to_path_buf(),
            uploads,
            work_dir: work_dir.as_ref().to_path_buf(),
            box_size: [20.0; 3],
            exhaustiveness: 8,
        }
    }

    pub fn with_box_size(mut self, size: [f64; 3]) -> Self {
        self.box_size = size;
        self
    }

    pub fn with_exhaustiveness(mut self, exhaustiveness: u32) -> Self {
        self.exhaustiveness = exhaustiveness.max(1);
        self
    }

    /// Run AutoDock Vina with the given configuration and return the best pose energy.
    pub async fn run(&self, config: &DockingConfig) -> Result<f64, StageFailure> {
        info!("Running AutoDock Vina on {:?}", config.ligand);

        let mut command = Command::new(&self.executable_path);
        command.args(config.args());
        run_tool("vina", &mut command).await?;

        let poses = fs::read_to_string(&config.out)
            .await
            .map_err(|e| StageFailure::tool_crash(format!("Vina output missing at {:?}: {}", config.out, e)))?;
        let energy = best_energy(&poses).map_err(|e| StageFailure::tool_crash(e.to_string()))?;
        debug!("AutoDock Vina completed successfully. Output in {:?}", config.out);
        Ok(energy)
    }
}

/// Vina needs a PDBQT receptor; accept one directly or next to the PDB.
async fn receptor_for(structure: &Path) -> Result<PathBuf, StageFailure> {
    if structure.extension().and_then(|e| e.to_str()) == Some("pdbqt") {
        return Ok(structure.to_path_buf());
    }
    let sibling = structure.with_extension("pdbqt");
    if fs::try_exists(&sibling).await.unwrap_or(false) {
        return Ok(sibling);
    }
    Err(StageFailure::invalid_input(format!(
        "Vina needs a PDBQT receptor, none found for {:?}",
        structure
    )))
}

/// First `REMARK VINA RESULT:` line is the top-ranked pose.
pub fn best_energy(poses: &str) -> atomera_common::Result<f64> {
    poses
        .lines()
        .find_map(|l| l.strip_prefix("REMARK VINA RESULT:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|v| v.parse::<f64>().ok())
        .ok_or_else(|| AtomeraError::ToolOutput("no VINA RESULT remark in docking output".to_string()))
}

fn energy_confidence(kcal_per_mol: f64) -> Confidence {
    if kcal_per_mol <= -9.0 {
        Confidence::High
    } else if kcal_per_mol <= -7.0 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

#[async_trait]
impl StageExecutor for VinaRunner {
    type Input = AffinityInput;
    type Output = Vec<RankedLigand>;

    fn name(&self) -> &str {
        "vina"
    }

    async fn execute(&self, input: AffinityInput) -> Result<Vec<RankedLigand>, StageFailure> {
        let pocket = input
            .pockets
            .first()
            .ok_or_else(|| StageFailure::invalid_input("docking needs at least one pocket to place the search box"))?;
        let receptor = receptor_for(&input.structure.path).await?;
        let ligands = self.uploads.ligands(&input.ligand_set_id).await?;

        let out_dir = self.work_dir.join(input.job_id.to_string()).join("vina");
        fs::create_dir_all(&out_dir).await.map_err(|e| io_failure("creating Vina output directory", e))?;

        let mut scored = Vec::with_capacity(ligands.len());
        for ligand in ligands {
            let file = ligand
                .file
                .filter(|f| f.extension().and_then(|e| e.to_str()) == Some("pdbqt"))
                .ok_or_else(|| StageFailure::invalid_input(format!("ligand {} has no PDBQT file for docking", ligand.id)))?;
            let config = DockingConfig {
                receptor: receptor.clone(),
                ligand: file,
                center: pocket.center,
                size: self.box_size,
                exhaustiveness: self.exhaustiveness,
                out: out_dir.join(format!("{}_out.pdbqt", ligand.id)),
            };
            let energy = self.run(&config).await?;
            scored.push(RankedLigand {
                ligand_id: ligand.id,
                score: energy,
                affinity_type: AffinityMode::Vina.affinity_type().to_string(),
                binder_prob: None,
                confidence: energy_confidence(energy),
                complex_path: Some(config.out),
            });
        }
        Ok(rank_ligands(scored))
    }
}
