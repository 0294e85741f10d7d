//! Configuration loading for Atomera.
//! Reads atomera.toml from the current directory or path in ATOMERA_CONFIG env var.

use atomera_jobs::{SchedulerConfig, StageTimeouts};
use atomera_molecules::pipeline::{
    AffinitySettings, PipelineSettings, PocketSettings, StorageSettings, StructureSettings, StubSettings,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub stages: StageConfig,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub structure: StructureSettings,
    #[serde(default)]
    pub pockets: PocketSettings,
    #[serde(default)]
    pub affinity: AffinitySettings,
    #[serde(default)]
    pub stub: StubSettings,
}

/// Per-stage wall-clock limits in seconds. Unset means no limit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageConfig {
    pub structure_timeout_secs: Option<u64>,
    pub pockets_timeout_secs: Option<u64>,
    pub affinity_timeout_secs: Option<u64>,
}

pub const DEFAULT_CONFIG_PATH: &str = "atomera.toml";

impl Config {
    /// Load configuration from atomera.toml.
    /// Checks ATOMERA_CONFIG env var first, then current directory.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("ATOMERA_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!(
                "Config file not found: {}\n\
                 Copy atomera.example.toml to atomera.toml and edit it.",
                path.display()
            );
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn stage_timeouts(&self) -> StageTimeouts {
        StageTimeouts {
            structure: self.stages.structure_timeout_secs.map(Duration::from_secs),
            pockets: self.stages.pockets_timeout_secs.map(Duration::from_secs),
            affinity: self.stages.affinity_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            storage: self.storage.clone(),
            structure: self.structure.clone(),
            pockets: self.pockets.clone(),
            affinity: self.affinity.clone(),
            stub: self.stub.clone(),
        }
    }
}
