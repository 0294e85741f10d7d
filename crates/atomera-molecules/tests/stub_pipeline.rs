use atomera_common::{AffinityMode, Confidence, JobRequest};
use atomera_jobs::{InMemoryJobStore, JobStatus, JobStore, PipelineService, SchedulerConfig, StageTimeouts};
use atomera_molecules::pipeline::{
    build_executors, AffinitySettings, PipelineSettings, PocketSettings, StructureSettings,
};
use std::sync::Arc;
use std::time::Duration;

fn stub_service() -> PipelineService {
    let settings = PipelineSettings {
        structure: StructureSettings { backend: "stub".to_string(), ..Default::default() },
        pockets: PocketSettings { backend: "stub".to_string(), ..Default::default() },
        affinity: AffinitySettings { backend: "stub".to_string(), ..Default::default() },
        ..Default::default()
    };
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    PipelineService::new(
        store,
        build_executors(&settings).unwrap(),
        StageTimeouts::default(),
        SchedulerConfig { max_concurrent_jobs: 2 },
    )
    .unwrap()
}

async fn wait_done(service: &PipelineService, id: atomera_jobs::JobId) -> JobStatus {
    for _ in 0..200 {
        let status = service.status(id).await.unwrap().status;
        if status.is_terminal() {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {} did not finish", id);
}

#[tokio::test]
async fn test_stub_backends_reproduce_demo_results() {
    let service = stub_service();
    let id = service.submit(JobRequest::new("P1", "L1")).await.unwrap();
    assert_eq!(wait_done(&service, id).await, JobStatus::Done);

    let summary = service.results(id).await.unwrap();
    assert_eq!(summary.pockets.len(), 2);
    assert_eq!(summary.pockets[0].center, [10.0, 15.5, 20.0]);
    let ids: Vec<_> = summary.ranked_ligands.iter().map(|l| l.ligand_id.as_str()).collect();
    assert_eq!(ids, vec!["lig_1", "lig_2"]);
    assert_eq!(summary.ranked_ligands[0].confidence, Confidence::High);
    assert_eq!(summary.ranked_ligands[1].confidence, Confidence::Medium);

    let detail = service.ligand_detail(id, "lig_2").await.unwrap();
    assert_eq!(detail.rank, 2);
    service.shutdown().await;
}

#[tokio::test]
async fn test_vina_mode_labels_scores_in_kcal() {
    let service = stub_service();
    let request = JobRequest::new("P1", "L1").with_affinity_mode(AffinityMode::Vina);
    let id = service.submit(request).await.unwrap();
    assert_eq!(wait_done(&service, id).await, JobStatus::Done);

    let summary = service.results(id).await.unwrap();
    assert!(summary.ranked_ligands.iter().all(|l| l.affinity_type == "kcal/mol"));
    service.shutdown().await;
}
