use crate::error::RuntimeError;
use model::config::RunConfig;
use model::counts::{JobCounts, StatusReport};
use model::paths;
use model::phase::RunPhase;
use scheduler::Scheduler;
use storage::ObjectStore;
use tracing::debug;

/// Derive the run phase from current counts.
///
/// Failure is sticky: a single failed job marks the run failed even while
/// others are still running, and no later success reverses it.
pub fn derive_phase(counts: &JobCounts, submission_recorded: bool) -> RunPhase {
    if counts.failed > 0 {
        RunPhase::Failure
    } else if counts.total() > 0 && counts.in_flight() == 0 {
        RunPhase::Success
    } else if counts.total() > 0 {
        RunPhase::Running
    } else if submission_recorded {
        RunPhase::Submitting
    } else {
        RunPhase::Creating
    }
}

/// One-shot status roll-up. No state is carried between invocations;
/// everything needed is in the scheduler or the results location.
pub struct StatusAggregator<'a> {
    scheduler: &'a dyn Scheduler,
    store: &'a dyn ObjectStore,
    cfg: &'a RunConfig,
}

impl<'a> StatusAggregator<'a> {
    pub fn new(
        scheduler: &'a dyn Scheduler,
        store: &'a dyn ObjectStore,
        cfg: &'a RunConfig,
    ) -> Self {
        StatusAggregator {
            scheduler,
            store,
            cfg,
        }
    }

    /// Terminal phase recorded at the results location, if any. Sentinels
    /// outlive the cluster, so a finished run keeps answering correctly
    /// after teardown.
    pub async fn phase_from_results(&self) -> Result<Option<RunPhase>, RuntimeError> {
        let failure = paths::metadata_file(&self.cfg.results, paths::SENTINEL_FAILURE);
        if self.store.exists(&failure).await? {
            return Ok(Some(RunPhase::Failure));
        }
        let success = paths::metadata_file(&self.cfg.results, paths::SENTINEL_SUCCESS);
        if self.store.exists(&success).await? {
            return Ok(Some(RunPhase::Success));
        }
        Ok(None)
    }

    /// Compute the current snapshot and phase. A scheduler query failure
    /// propagates as an error; no phase is asserted for it.
    pub async fn check(&self) -> Result<StatusReport, RuntimeError> {
        if let Some(phase) = self.phase_from_results().await? {
            debug!(phase = %phase, "Terminal phase already recorded at results location");
            return Ok(StatusReport::new(
                phase,
                JobCounts::default(),
                format!("run already finalized as {phase}"),
            ));
        }

        // A failed submission means batch jobs may not exist at all, so it
        // is checked before the per-batch counts.
        let submit_counts = self.scheduler.count_jobs(&self.cfg.submit_selector).await?;
        if submit_counts.failed > 0 {
            return Ok(StatusReport::new(
                RunPhase::Failure,
                JobCounts::default(),
                "job submission failed",
            ));
        }

        let counts = self.scheduler.count_jobs(&self.cfg.job_selector).await?;
        let submission_recorded = self
            .store
            .exists(&paths::metadata_file(&self.cfg.results, paths::NUM_JOBS_FILE))
            .await?;
        let phase = derive_phase(&counts, submission_recorded);
        debug!(phase = %phase, %counts, "Derived run phase");
        Ok(StatusReport::new(phase, counts, counts.to_string()))
    }
}

/// Load the run configuration persisted at submit time.
pub async fn load_run_config(
    store: &dyn ObjectStore,
    results: &str,
) -> Result<RunConfig, RuntimeError> {
    let raw = store
        .get_object(&paths::metadata_file(results, paths::RUN_CONFIG_FILE))
        .await?;
    let text = String::from_utf8_lossy(&raw);
    Ok(RunConfig::from_json(&text)?)
}
