//! Executor wiring: turns backend settings into the three stage executors.

use anyhow::bail;
use atomera_common::AffinityMode;
use atomera_jobs::executor::{AffinityExecutor, PocketExecutor, StructureExecutor};
use atomera_jobs::StageExecutors;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::affinity::AffinityRouter;
use crate::boltz::Boltz2Runner;
use crate::docking::VinaRunner;
use crate::pocket::P2RankRunner;
use crate::structure::{EsmFoldClient, DEFAULT_ESMFOLD_URL};
use crate::stub::{StubAffinity, StubPockets, StubStructure};
use crate::uploads::UploadLayout;
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

fn default_uploads_dir() -> PathBuf { PathBuf::from("./data/uploads") }
fn default_work_dir() -> PathBuf { PathBuf::from("./data/jobs") }

impl Default for StorageSettings {
    fn default() -> Self {
        Self { uploads_dir: default_uploads_dir(), work_dir: default_work_dir() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureSettings {
    /// "esmfold" | "stub"
    #[serde(default = "default_structure_backend")]
    pub backend: String,
    #[serde(default = "default_esmfold_url")]
    pub esmfold_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: usize,
}

fn default_structure_backend() -> String { "esmfold".to_string() }
fn default_esmfold_url() -> String { DEFAULT_ESMFOLD_URL.to_string() }
fn default_request_timeout_secs() -> u64 { 300 }
fn default_max_sequence_length() -> usize { 400 }

impl Default for StructureSettings {
    fn default() -> Self {
        Self {
            backend: default_structure_backend(),
            esmfold_url: default_esmfold_url(),
            request_timeout_secs: default_request_timeout_secs(),
            max_sequence_length: default_max_sequence_length(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PocketSettings {
    /// "p2rank" | "stub"
    #[serde(default = "default_pocket_backend")]
    pub backend: String,
    #[serde(default = "default_p2rank_path")]
    pub p2rank_path: PathBuf,
    #[serde(default = "default_threads")]
    pub threads: u32,
}

fn default_pocket_backend() -> String { "p2rank".to_string() }
fn default_p2rank_path() -> PathBuf { PathBuf::from("prank") }
fn default_threads() -> u32 { 4 }

impl Default for PocketSettings {
    fn default() -> Self {
        Self {
            backend: default_pocket_backend(),
            p2rank_path: default_p2rank_path(),
            threads: default_threads(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffinitySettings {
    /// "tools" | "stub"
    #[serde(default = "default_affinity_backend")]
    pub backend: String,
    #[serde(default = "default_boltz_path")]
    pub boltz_path: PathBuf,
    #[serde(default)]
    pub use_msa_server: bool,
    #[serde(default = "default_vina_path")]
    pub vina_path: PathBuf,
    #[serde(default = "default_exhaustiveness")]
    pub exhaustiveness: u32,
    /// Search box edge lengths in Angstrom.
    #[serde(default = "default_box_size")]
    pub box_size: [f64; 3],
}

fn default_affinity_backend() -> String { "tools".to_string() }
fn default_boltz_path() -> PathBuf { PathBuf::from("boltz") }
fn default_vina_path() -> PathBuf { PathBuf::from("vina") }
fn default_exhaustiveness() -> u32 { 8 }
fn default_box_size() -> [f64; 3] { [20.0, 20.0, 20.0] }

impl Default for AffinitySettings {
    fn default() -> Self {
        Self {
            backend: default_affinity_backend(),
            boltz_path: default_boltz_path(),
            use_msa_server: false,
            vina_path: default_vina_path(),
            exhaustiveness: default_exhaustiveness(),
            box_size: default_box_size(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StubSettings {
    /// Simulated run time of each stubbed stage.
    #[serde(default)]
    pub latency_ms: u64,
}

/// Everything needed to build the stage executors.
#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    pub storage: StorageSettings,
    pub structure: StructureSettings,
    pub pockets: PocketSettings,
    pub affinity: AffinitySettings,
    pub stub: StubSettings,
}

pub fn build_executors(settings: &PipelineSettings) -> Result<StageExecutors> {
    let uploads = UploadLayout::new(&settings.storage.uploads_dir);
    let work_dir = &settings.storage.work_dir;
    let latency = Duration::from_millis(settings.stub.latency_ms);

    let structure: Arc<StructureExecutor> = match settings.structure.backend.as_str() {
        "esmfold" => Arc::new(
            EsmFoldClient::new(
                settings.structure.esmfold_url.clone(),
                uploads.clone(),
                work_dir,
                Duration::from_secs(settings.structure.request_timeout_secs),
            )?
            .with_max_sequence_length(settings.structure.max_sequence_length),
        ),
        "stub" => Arc::new(StubStructure::new(work_dir.clone(), latency)),
        other => bail!("unknown structure backend '{}'", other),
    };

    let pockets: Arc<PocketExecutor> = match settings.pockets.backend.as_str() {
        "p2rank" => Arc::new(
            P2RankRunner::new(&settings.pockets.p2rank_path, work_dir).with_threads(settings.pockets.threads),
        ),
        "stub" => Arc::new(StubPockets::new(latency)),
        other => bail!("unknown pocket backend '{}'", other),
    };

    let affinity_settings = &settings.affinity;
    let router = match affinity_settings.backend.as_str() {
        "tools" => {
            let boltz = Boltz2Runner::new(&affinity_settings.boltz_path, uploads.clone(), work_dir)
                .with_msa_server(affinity_settings.use_msa_server);
            let vina = VinaRunner::new(&affinity_settings.vina_path, uploads, work_dir)
                .with_box_size(affinity_settings.box_size)
                .with_exhaustiveness(affinity_settings.exhaustiveness);
            AffinityRouter::new()
                .with_backend(AffinityMode::Boltz2, Arc::new(boltz))
                .with_backend(AffinityMode::Vina, Arc::new(vina))
        }
        "stub" => {
            let stub: Arc<AffinityExecutor> = Arc::new(StubAffinity::new(latency));
            AffinityRouter::new()
                .with_backend(AffinityMode::Boltz2, stub.clone())
                .with_backend(AffinityMode::Vina, stub)
        }
        other => bail!("unknown affinity backend '{}'", other),
    };

    let executors = StageExecutors::new(structure, pockets, Arc::new(router));
    info!("Stage executors: {:?}", executors);
    Ok(executors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use atomera_jobs::StageExecutor;

    fn stub_settings() -> PipelineSettings {
        PipelineSettings {
            structure: StructureSettings { backend: "stub".to_string(), ..Default::default() },
            pockets: PocketSettings { backend: "stub".to_string(), ..Default::default() },
            affinity: AffinitySettings { backend: "stub".to_string(), ..Default::default() },
            ..Default::default()
        }
    }

    #[test]
    fn test_default_backends_are_the_real_tools() {
        let executors = build_executors(&PipelineSettings::default()).unwrap();
        assert_eq!(executors.structure.name(), "esmfold");
        assert_eq!(executors.pockets.name(), "p2rank");
        assert_eq!(executors.affinity.name(), "affinity");
    }

    #[test]
    fn test_stub_backends() {
        let executors = build_executors(&stub_settings()).unwrap();
        assert_eq!(executors.structure.name(), "stub-structure");
        assert_eq!(executors.pockets.name(), "stub-pockets");
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let mut settings = stub_settings();
        settings.pockets.backend = "fpocket".to_string();
        let err = build_executors(&settings).unwrap_err();
        assert_eq!(err.to_string(), "unknown pocket backend 'fpocket'");
    }
}
