use crate::descriptor::JobDescriptor;
use crate::error::SchedulerError;
use async_trait::async_trait;
use model::counts::JobCounts;

/// The cluster scheduler collaborator.
///
/// Everything the run lifecycle needs from the scheduler: bulk-apply a
/// group of descriptors, count jobs matching a label selector grouped by
/// state, delete resources matching a selector, and size the worker pool.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Apply one submission group. Returns the names of the created jobs.
    async fn apply_group(&self, group: &[JobDescriptor]) -> Result<Vec<String>, SchedulerError>;

    async fn count_jobs(&self, selector: &str) -> Result<JobCounts, SchedulerError>;

    /// Delete jobs and associated resources matching the selector.
    async fn delete_resources(&self, selector: &str) -> Result<(), SchedulerError>;

    /// Resize the named worker pool.
    async fn scale_pool(&self, pool: &str, replicas: u32) -> Result<(), SchedulerError>;
}
