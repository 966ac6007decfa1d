use crate::error::RuntimeError;
use crate::status::StatusAggregator;
use chrono::Utc;
use model::config::RunConfig;
use model::counts::StatusReport;
use model::paths;
use model::phase::RunPhase;
use scheduler::Scheduler;
use storage::ObjectStore;
use tracing::{debug, info, warn};

/// Idempotent reconciler over one run.
///
/// Every invocation re-derives the phase from current truth, so crashed or
/// duplicated invocations cannot leave the system inconsistent beyond the
/// narrow sentinel race between the existence check and the write.
pub struct Janitor<'a> {
    scheduler: &'a dyn Scheduler,
    store: &'a dyn ObjectStore,
    cfg: &'a RunConfig,
}

impl<'a> Janitor<'a> {
    pub fn new(
        scheduler: &'a dyn Scheduler,
        store: &'a dyn ObjectStore,
        cfg: &'a RunConfig,
    ) -> Self {
        Janitor {
            scheduler,
            store,
            cfg,
        }
    }

    fn metadata_file(&self, name: &str) -> String {
        paths::metadata_file(&self.cfg.results, name)
    }

    /// One reconciliation pass. Non-terminal phases are a no-op poll;
    /// terminal phases record a sentinel and tear the run down.
    pub async fn reconcile(&self) -> Result<RunPhase, RuntimeError> {
        let aggregator = StatusAggregator::new(self.scheduler, self.store, self.cfg);

        if self.store.exists(&self.metadata_file(paths::SENTINEL_DONE)).await? {
            let phase = aggregator
                .phase_from_results()
                .await?
                .unwrap_or(RunPhase::Unknown);
            debug!(results = %self.cfg.results, "Run already torn down");
            return Ok(phase);
        }

        let report = aggregator.check().await?;
        match report.phase {
            RunPhase::Success => {
                info!(
                    results = %self.cfg.results,
                    cluster = %self.cfg.cluster_name,
                    "Run is DONE, deleting its resources"
                );
                self.finalize(paths::SENTINEL_SUCCESS, &report).await?;
                Ok(RunPhase::Success)
            }
            RunPhase::Failure => {
                info!(
                    results = %self.cfg.results,
                    cluster = %self.cfg.cluster_name,
                    "Run has FAILED, deleting its resources"
                );
                self.finalize(paths::SENTINEL_FAILURE, &report).await?;
                Ok(RunPhase::Failure)
            }
            phase => {
                debug!(phase = %phase, results = %self.cfg.results, "Nothing to reconcile");
                Ok(phase)
            }
        }
    }

    /// Record the terminal sentinel (best-effort, guarded by an existence
    /// check) and tear down. Teardown is never blocked by a failed
    /// sentinel write.
    async fn finalize(&self, sentinel: &str, report: &StatusReport) -> Result<(), RuntimeError> {
        let failure_loc = self.metadata_file(paths::SENTINEL_FAILURE);
        let sentinel_loc = self.metadata_file(sentinel);

        let already_recorded = self.store.exists(&failure_loc).await.unwrap_or(false)
            || self.store.exists(&sentinel_loc).await.unwrap_or(false);
        if !already_recorded {
            let body = format!("{}\n{}\n", Utc::now().to_rfc3339(), report.counts);
            if let Err(err) = self.store.put_object(&sentinel_loc, body.into_bytes()).await {
                warn!(error = %err, sentinel = %sentinel_loc, "Sentinel write failed, tearing down anyway");
            }
        }

        self.teardown().await?;

        let done_loc = self.metadata_file(paths::SENTINEL_DONE);
        if !self.store.exists(&done_loc).await.unwrap_or(false) {
            let body = format!("{}\n", Utc::now().to_rfc3339());
            if let Err(err) = self.store.put_object(&done_loc, body.into_bytes()).await {
                warn!(error = %err, "Failed to record teardown marker");
            }
        }
        Ok(())
    }

    /// Delete the run's cluster resources. Errors propagate so the next
    /// invocation retries the deletion.
    async fn teardown(&self) -> Result<(), RuntimeError> {
        self.scheduler
            .delete_resources(&self.cfg.job_selector)
            .await?;
        self.scheduler
            .delete_resources(&self.cfg.submit_selector)
            .await?;
        info!(cluster = %self.cfg.cluster_name, "Deleted run resources");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StaticScheduler, test_config};
    use async_trait::async_trait;
    use model::counts::JobCounts;
    use storage::store::ObjectMeta;
    use storage::{MemoryStore, StorageError};

    fn succeeded(n: u32) -> JobCounts {
        JobCounts {
            succeeded: n,
            ..JobCounts::default()
        }
    }

    #[tokio::test]
    async fn test_success_writes_sentinel_and_tears_down() {
        let cfg = test_config("mem://run");
        let store = MemoryStore::new();
        let scheduler = StaticScheduler::with_job_counts(succeeded(3));

        let phase = Janitor::new(&scheduler, &store, &cfg).reconcile().await.unwrap();
        assert_eq!(phase, RunPhase::Success);
        assert!(store.contains("mem://run/metadata/SUCCESS.txt"));
        assert!(store.contains("mem://run/metadata/DONE.txt"));
        assert_eq!(
            scheduler.deleted_selectors(),
            vec!["app=seqferry-search", "app=seqferry-submit"]
        );
    }

    #[tokio::test]
    async fn test_failure_writes_failure_sentinel_with_counts() {
        let cfg = test_config("mem://run");
        let store = MemoryStore::new();
        let scheduler = StaticScheduler::with_job_counts(JobCounts {
            pending: 1,
            running: 1,
            succeeded: 2,
            failed: 1,
        });

        let phase = Janitor::new(&scheduler, &store, &cfg).reconcile().await.unwrap();
        assert_eq!(phase, RunPhase::Failure);
        let sentinel = store
            .get_object("mem://run/metadata/FAILURE.txt")
            .await
            .unwrap();
        let text = String::from_utf8(sentinel).unwrap();
        assert!(text.contains("Failed 1"), "sentinel body: {text}");
        assert!(!store.contains("mem://run/metadata/SUCCESS.txt"));
        assert!(!scheduler.deleted_selectors().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_twice_writes_sentinel_once_and_does_not_error() {
        let cfg = test_config("mem://run");
        let store = MemoryStore::new();
        let scheduler = StaticScheduler::with_job_counts(succeeded(2));
        let janitor = Janitor::new(&scheduler, &store, &cfg);

        assert_eq!(janitor.reconcile().await.unwrap(), RunPhase::Success);
        let first = store
            .get_object("mem://run/metadata/SUCCESS.txt")
            .await
            .unwrap();

        // Second invocation finds the DONE marker and leaves everything be.
        assert_eq!(janitor.reconcile().await.unwrap(), RunPhase::Success);
        let second = store
            .get_object("mem://run/metadata/SUCCESS.txt")
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(scheduler.deleted_selectors().len(), 2);
    }

    #[tokio::test]
    async fn test_non_terminal_phase_is_a_noop_poll() {
        let cfg = test_config("mem://run");
        let store = MemoryStore::new();
        store.insert("mem://run/metadata/num_jobs_submitted.txt", b"3");
        let scheduler = StaticScheduler::with_job_counts(JobCounts {
            pending: 1,
            running: 2,
            succeeded: 0,
            failed: 0,
        });

        let phase = Janitor::new(&scheduler, &store, &cfg).reconcile().await.unwrap();
        assert_eq!(phase, RunPhase::Running);
        assert!(!store.contains("mem://run/metadata/SUCCESS.txt"));
        assert!(!store.contains("mem://run/metadata/FAILURE.txt"));
        assert!(scheduler.deleted_selectors().is_empty());
    }

    #[tokio::test]
    async fn test_failed_submission_is_failure_without_batch_jobs() {
        let cfg = test_config("mem://run");
        let store = MemoryStore::new();
        let scheduler = StaticScheduler::with_job_counts(JobCounts::default()).submit_counts(
            JobCounts {
                failed: 1,
                ..JobCounts::default()
            },
        );

        let phase = Janitor::new(&scheduler, &store, &cfg).reconcile().await.unwrap();
        assert_eq!(phase, RunPhase::Failure);
        assert!(store.contains("mem://run/metadata/FAILURE.txt"));
    }

    #[tokio::test]
    async fn test_success_does_not_overwrite_failure_sentinel() {
        let cfg = test_config("mem://run");
        let store = MemoryStore::new();
        store.insert("mem://run/metadata/FAILURE.txt", b"earlier failure");
        let scheduler = StaticScheduler::with_job_counts(succeeded(3));

        // The recorded failure short-circuits the aggregator, so the run
        // finalizes as failed and SUCCESS is never written.
        let phase = Janitor::new(&scheduler, &store, &cfg).reconcile().await.unwrap();
        assert_eq!(phase, RunPhase::Failure);
        assert!(!store.contains("mem://run/metadata/SUCCESS.txt"));
        assert_eq!(
            store
                .get_object("mem://run/metadata/FAILURE.txt")
                .await
                .unwrap(),
            b"earlier failure"
        );
    }

    /// Store whose sentinel writes fail; teardown must proceed regardless.
    struct SentinelRejectingStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl storage::ObjectStore for SentinelRejectingStore {
        async fn get_object(&self, location: &str) -> Result<Vec<u8>, StorageError> {
            self.inner.get_object(location).await
        }

        async fn put_object(&self, location: &str, body: Vec<u8>) -> Result<(), StorageError> {
            if location.ends_with("SUCCESS.txt") || location.ends_with("FAILURE.txt") {
                return Err(StorageError::PermissionDenied(location.to_string()));
            }
            self.inner.put_object(location, body).await
        }

        async fn head_object(&self, location: &str) -> Result<ObjectMeta, StorageError> {
            self.inner.head_object(location).await
        }

        async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
            self.inner.list_prefix(prefix).await
        }

        async fn delete_prefix(&self, prefix: &str) -> Result<(), StorageError> {
            self.inner.delete_prefix(prefix).await
        }
    }

    #[tokio::test]
    async fn test_teardown_proceeds_when_sentinel_write_fails() {
        let cfg = test_config("mem://run");
        let store = SentinelRejectingStore {
            inner: MemoryStore::new(),
        };
        let scheduler = StaticScheduler::with_job_counts(succeeded(1));

        let phase = Janitor::new(&scheduler, &store, &cfg).reconcile().await.unwrap();
        assert_eq!(phase, RunPhase::Success);
        assert!(!store.inner.contains("mem://run/metadata/SUCCESS.txt"));
        // Resources were still deleted and the teardown marker recorded.
        assert_eq!(scheduler.deleted_selectors().len(), 2);
        assert!(store.inner.contains("mem://run/metadata/DONE.txt"));
    }
}
