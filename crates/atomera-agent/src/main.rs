//! Atomera - binding-affinity pipeline runner.
//! Entry point for the agent binary.

mod config;

use anyhow::Context;
use atomera_common::{AffinityMode, JobRequest, PocketMode};
use atomera_jobs::{InMemoryJobStore, JobId, JobStatus, JobStore, PipelineService};
use atomera_molecules::pipeline::build_executors;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "atomera", version, about = "Protein-ligand binding affinity pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit one job and wait for its results.
    Run {
        /// Uploaded protein reference (FASTA or PDB).
        #[arg(long)]
        protein: String,
        /// Uploaded ligand set reference.
        #[arg(long)]
        ligands: String,
        #[arg(long, default_value = "auto")]
        pocket_mode: PocketMode,
        #[arg(long, default_value = "boltz2")]
        affinity_mode: AffinityMode,
        /// Status polling interval in milliseconds.
        #[arg(long, default_value_t = 1000)]
        poll_ms: u64,
    },
    /// Submit every `[[jobs]]` entry of a TOML file and wait for all of them.
    Batch {
        file: PathBuf,
        #[arg(long, default_value_t = 1000)]
        poll_ms: u64,
    },
}

#[derive(Debug, Deserialize)]
struct BatchFile {
    jobs: Vec<JobRequest>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("atomera=debug,info")),
        )
        .init();

    let cli = Cli::parse();
    info!("Atomera starting up...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = match config::Config::load() {
        Ok(c) => {
            info!(
                "Configuration loaded. Structure: {}, pockets: {}, affinity: {}",
                c.structure.backend, c.pockets.backend, c.affinity.backend
            );
            c
        }
        Err(e) => {
            warn!("{}", e);
            warn!("Falling back to default configuration");
            config::Config::default()
        }
    };

    let executors = build_executors(&config.pipeline_settings())?;
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let service = PipelineService::new(store, executors, config.stage_timeouts(), config.scheduler.clone())?;
    info!("Scheduler ready, {} concurrent jobs", service.scheduler().max_concurrent());

    let outcome = match cli.command {
        Command::Run { protein, ligands, pocket_mode, affinity_mode, poll_ms } => {
            let request = JobRequest::new(protein, ligands)
                .with_pocket_mode(pocket_mode)
                .with_affinity_mode(affinity_mode);
            run_jobs(&service, vec![request], Duration::from_millis(poll_ms)).await
        }
        Command::Batch { file, poll_ms } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading batch file {}", file.display()))?;
            let batch: BatchFile = toml::from_str(&text)
                .with_context(|| format!("parsing batch file {}", file.display()))?;
            info!("Batch {} holds {} jobs", file.display(), batch.jobs.len());
            run_jobs(&service, batch.jobs, Duration::from_millis(poll_ms)).await
        }
    };

    service.shutdown().await;
    outcome
}

/// Submit every request, poll until all are terminal, then print their outcomes.
async fn run_jobs(service: &PipelineService, requests: Vec<JobRequest>, poll: Duration) -> anyhow::Result<()> {
    let mut jobs: Vec<(JobId, JobStatus)> = Vec::with_capacity(requests.len());
    for request in requests {
        let id = service.submit(request).await?;
        info!(job_id = %id, "Job submitted");
        jobs.push((id, JobStatus::Queued));
    }

    let mut interval = tokio::time::interval(poll.max(Duration::from_millis(1)));
    while jobs.iter().any(|(_, status)| !status.is_terminal()) {
        interval.tick().await;
        for (id, last) in jobs.iter_mut().filter(|(_, s)| !s.is_terminal()) {
            let view = service.status(*id).await?;
            if view.status != *last {
                info!(job_id = %id, status = %view.status, "Status changed");
                *last = view.status;
            }
        }
    }

    let mut failed = 0;
    for (id, _) in &jobs {
        match service.results(*id).await {
            Ok(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
            Err(e) => {
                error!(job_id = %id, "{}", e);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{} of {} jobs failed", failed, jobs.len());
    }
    Ok(())
}
