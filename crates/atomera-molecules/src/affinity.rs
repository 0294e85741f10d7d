//! Affinity stage: routes each job to the scoring backend its request names.

use async_trait::async_trait;
use atomera_common::{AffinityMode, RankedLigand};
use atomera_jobs::executor::{AffinityExecutor, AffinityInput};
use atomera_jobs::{StageExecutor, StageFailure};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
pub struct AffinityRouter {
    backends: HashMap<AffinityMode, Arc<AffinityExecutor>>,
}

impl AffinityRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, mode: AffinityMode, executor: Arc<AffinityExecutor>) -> Self {
        self.backends.insert(mode, executor);
        self
    }

    pub fn modes(&self) -> Vec<AffinityMode> {
        let mut modes: Vec<_> = self.backends.keys().copied().collect();
        modes.sort_by_key(|m| m.as_str());
        modes
    }
}

impl std::fmt::Debug for AffinityRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffinityRouter").field("modes", &self.modes()).finish()
    }
}

#[async_trait]
impl StageExecutor for AffinityRouter {
    type Input = AffinityInput;
    type Output = Vec<RankedLigand>;

    fn name(&self) -> &str {
        "affinity"
    }

    async fn execute(&self, input: AffinityInput) -> Result<Vec<RankedLigand>, StageFailure> {
        let backend = self.backends.get(&input.mode).ok_or_else(|| {
            StageFailure::invalid_input(format!("affinity mode {} is not configured", input.mode))
        })?;
        debug!("Affinity mode {} routed to {}", input.mode, backend.name());
        backend.execute(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubAffinity;
    use atomera_common::{StructureRef, StructureSource};
    use atomera_jobs::{FailureCause, JobId};
    use std::time::Duration;

    fn input(mode: AffinityMode) -> AffinityInput {
        AffinityInput {
            job_id: JobId::new(),
            structure: StructureRef { path: "s.pdb".into(), sequence: None, source: StructureSource::Predicted },
            pockets: vec![],
            ligand_set_id: "set".to_string(),
            mode,
        }
    }

    #[tokio::test]
    async fn test_routes_by_mode() {
        let router = AffinityRouter::new()
            .with_backend(AffinityMode::Vina, Arc::new(StubAffinity::new(Duration::ZERO)));
        let ranked = router.execute(input(AffinityMode::Vina)).await.unwrap();
        assert_eq!(ranked[0].affinity_type, "kcal/mol");
    }

    #[tokio::test]
    async fn test_unconfigured_mode_is_invalid_input() {
        let router = AffinityRouter::new();
        let err = router.execute(input(AffinityMode::Boltz2)).await.unwrap_err();
        assert_eq!(err.cause, FailureCause::InvalidInput);
        assert_eq!(err.message, "affinity mode boltz2 is not configured");
    }
}
