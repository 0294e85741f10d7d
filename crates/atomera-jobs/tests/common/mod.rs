//! Scripted stage executors and helpers shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use atomera_common::{
    Confidence, PocketCandidate, RankedLigand, StructureRef, StructureSource,
};
use atomera_jobs::executor::{AffinityInput, PocketInput, StructureInput};
use atomera_jobs::{JobId, JobStatus, JobStatusView, PipelineService, StageExecutor, StageExecutors, StageFailure};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

type Respond<I, O> = Box<dyn Fn(&I) -> Result<O, StageFailure> + Send + Sync>;

/// Tracks how many executions are in flight and the highest value seen.
#[derive(Debug, Default)]
pub struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl Gauge {
    fn enter(self: &Arc<Self>) -> GaugeGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        GaugeGuard(self.clone())
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub struct GaugeGuard(Arc<Gauge>);

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Executor whose answer is a closure over its input.
pub struct Scripted<I, O> {
    name: &'static str,
    respond: Respond<I, O>,
    delay: Duration,
    gate: Option<Arc<Semaphore>>,
    gauge: Arc<Gauge>,
}

impl<I, O> Scripted<I, O> {
    pub fn new(name: &'static str, respond: impl Fn(&I) -> Result<O, StageFailure> + Send + Sync + 'static) -> Self {
        Self {
            name,
            respond: Box::new(respond),
            delay: Duration::ZERO,
            gate: None,
            gauge: Arc::new(Gauge::default()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Block every call until the test adds a permit to `gate`.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_gauge(mut self, gauge: Arc<Gauge>) -> Self {
        self.gauge = gauge;
        self
    }
}

#[async_trait]
impl<I, O> StageExecutor for Scripted<I, O>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    type Input = I;
    type Output = O;

    fn name(&self) -> &str {
        self.name
    }

    async fn execute(&self, input: I) -> Result<O, StageFailure> {
        let _guard = self.gauge.enter();
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.respond)(&input)
    }
}

// ── Canned outputs ────────────────────────────────────────────────────────────

pub fn structure_for(protein_id: &str) -> StructureRef {
    StructureRef {
        path: PathBuf::from(format!("/work/{}.pdb", protein_id)),
        sequence: Some("MTEYKLVVVGAGGVGKSALTIQLIQ".to_string()),
        source: StructureSource::Predicted,
    }
}

pub fn two_pockets() -> Vec<PocketCandidate> {
    vec![
        PocketCandidate {
            id: 1,
            score: 0.95,
            probability: None,
            center: [10.0, 15.5, 20.0],
            residues: vec!["A:123".into(), "A:124".into(), "A:126".into()],
        },
        PocketCandidate {
            id: 2,
            score: 0.82,
            probability: None,
            center: [-5.0, 10.0, 5.0],
            residues: vec!["A:45".into(), "A:46".into()],
        },
    ]
}

pub fn two_ligands() -> Vec<RankedLigand> {
    vec![
        RankedLigand {
            ligand_id: "lig_1".into(),
            score: -9.5,
            affinity_type: "log10(IC50)".into(),
            binder_prob: Some(0.98),
            confidence: Confidence::High,
            complex_path: None,
        },
        RankedLigand {
            ligand_id: "lig_2".into(),
            score: -7.2,
            affinity_type: "log10(IC50)".into(),
            binder_prob: Some(0.65),
            confidence: Confidence::Medium,
            complex_path: None,
        },
    ]
}

pub fn ok_structure() -> Scripted<StructureInput, StructureRef> {
    Scripted::new("esmfold", |input: &StructureInput| Ok(structure_for(&input.protein_id)))
}

pub fn ok_pockets() -> Scripted<PocketInput, Vec<PocketCandidate>> {
    Scripted::new("p2rank", |_: &PocketInput| Ok(two_pockets()))
}

pub fn ok_affinity() -> Scripted<AffinityInput, Vec<RankedLigand>> {
    Scripted::new("boltz2", |_: &AffinityInput| Ok(two_ligands()))
}

pub fn executors(
    structure: Scripted<StructureInput, StructureRef>,
    pockets: Scripted<PocketInput, Vec<PocketCandidate>>,
    affinity: Scripted<AffinityInput, Vec<RankedLigand>>,
) -> StageExecutors {
    StageExecutors::new(Arc::new(structure), Arc::new(pockets), Arc::new(affinity))
}

pub fn happy_executors() -> StageExecutors {
    executors(ok_structure(), ok_pockets(), ok_affinity())
}

/// Invocation log, used to check dispatch order.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn logging_structure(log: CallLog) -> Scripted<StructureInput, StructureRef> {
    Scripted::new("esmfold", move |input: &StructureInput| {
        log.lock().unwrap().push(input.protein_id.clone());
        Ok(structure_for(&input.protein_id))
    })
}

/// Poll until the job is terminal.
pub async fn wait_terminal(service: &PipelineService, id: JobId) -> JobStatusView {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let view = service.status(id).await.unwrap();
            if view.status.is_terminal() {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("job did not reach a terminal status")
}

/// Poll until the job reaches `status`.
pub async fn wait_for(service: &PipelineService, id: JobId, status: JobStatus) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while service.status(id).await.unwrap().status != status {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("job did not reach the expected status");
}
