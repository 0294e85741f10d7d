//! Binding pocket detection using P2Rank.

use async_trait::async_trait;
use atomera_common::{AtomeraError, PocketCandidate, PocketMode, Result};
use atomera_jobs::executor::PocketInput;
use atomera_jobs::{StageExecutor, StageFailure};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use crate::process::{io_failure, run_tool};

/// Wrapper for `prank predict` execution.
pub struct P2RankRunner {
    executable_path: PathBuf,
    work_dir: PathBuf,
    threads: u32,
}

impl P2RankRunner {
    /// Create a new P2RankRunner.
    pub fn new<P: AsRef<Path>, W: AsRef<Path>>(executable_path: P, work_dir: W) -> Self {
        Self {
            executable_path: executable_path.as_ref().to_path_buf(),
            work_dir: work_dir.as_ref().to_path_buf(),
            threads: 1,
        }
    }

    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = threads.max(1);
        self
    }

    fn model_config(mode: PocketMode) -> Option<&'static str> {
        match mode {
            PocketMode::Auto => None,
            PocketMode::AlphaFold => Some("alphafold"),
            PocketMode::Conservation => Some("conservation_hmm"),
        }
    }
}

#[async_trait]
impl StageExecutor for P2RankRunner {
    type Input = PocketInput;
    type Output = Vec<PocketCandidate>;

    fn name(&self) -> &str {
        "p2rank"
    }

    async fn execute(&self, input: PocketInput) -> std::result::Result<Vec<PocketCandidate>, StageFailure> {
        let pdb_path = &input.structure.path;
        info!("Running P2Rank ({}) on {:?}", input.mode, pdb_path);

        let out_dir = self.work_dir.join(input.job_id.to_string()).join("p2rank");
        fs::create_dir_all(&out_dir).await.map_err(|e| io_failure("creating P2Rank output directory", e))?;

        let mut command = Command::new(&self.executable_path);
        command
            .arg("predict")
            .arg("-f")
            .arg(pdb_path)
            .arg("-o")
            .arg(&out_dir)
            .arg("-threads")
            .arg(self.threads.to_string());
        if let Some(config) = Self::model_config(input.mode) {
            command.arg("-c").arg(config);
        }
        run_tool("p2rank", &mut command).await?;

        // P2Rank names its table after the input file: <file>_predictions.csv
        let file_name = pdb_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| StageFailure::invalid_input("structure path has no file name"))?;
        let predictions = out_dir.join(format!("{}_predictions.csv", file_name));
        let table = fs::read_to_string(&predictions)
            .await
            .map_err(|e| StageFailure::tool_crash(format!("P2Rank predictions not found at {:?}: {}", predictions, e)))?;

        let pockets = parse_predictions(&table)
            .map_err(|e| StageFailure::tool_crash(format!("unreadable P2Rank predictions: {}", e)))?;
        debug!("P2Rank found {} pockets", pockets.len());
        Ok(pockets)
    }
}

#[derive(Debug, Deserialize)]
struct PredictionRow {
    rank: u32,
    score: f64,
    #[serde(default)]
    probability: Option<f64>,
    center_x: f64,
    center_y: f64,
    center_z: f64,
    #[serde(default)]
    residue_ids: String,
}

/// Parse a `<file>_predictions.csv` table, keeping P2Rank's rank order.
pub fn parse_predictions(table: &str) -> Result<Vec<PocketCandidate>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(table.as_bytes());

    let mut pockets = Vec::new();
    for row in reader.deserialize::<PredictionRow>() {
        let row = row?;
        pockets.push(PocketCandidate {
            id: row.rank,
            score: row.score,
            probability: row.probability,
            center: [row.center_x, row.center_y, row.center_z],
            residues: row.residue_ids.split_whitespace().map(residue_label).collect(),
        });
    }
    if pockets.windows(2).any(|w| w[0].id >= w[1].id) {
        return Err(AtomeraError::ToolOutput("pocket ranks are not increasing".to_string()));
    }
    Ok(pockets)
}

/// `A_123` -> `A:123`
fn residue_label(raw: &str) -> String {
    match raw.split_once('_') {
        Some((chain, number)) => format!("{}:{}", chain, number),
        None => raw.to_string(),
    }
}
