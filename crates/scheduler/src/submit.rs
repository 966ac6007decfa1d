use crate::api::Scheduler;
use crate::descriptor::{JobDescriptor, render_descriptors};
use crate::error::SchedulerError;
use crate::retry::{RetryDisposition, RetryPolicy};
use model::config::RunConfig;
use model::paths;
use std::collections::HashMap;
use std::time::Duration;
use storage::ObjectStore;
use tracing::{error, info, warn};

/// Outcome of applying all submission groups.
#[derive(Debug, Clone, Default)]
pub struct SubmissionReport {
    pub groups_total: usize,
    pub groups_failed: usize,
    /// Jobs actually created; the denominator for later reconciliation.
    pub jobs_submitted: usize,
    pub job_names: Vec<String>,
}

impl SubmissionReport {
    pub fn is_complete(&self) -> bool {
        self.groups_failed == 0
    }
}

/// Apply descriptors in fixed-size groups, in manifest order. Each group
/// gets the full retry budget; a group that exhausts it is recorded as
/// failed and later groups are still attempted, so a partial submission
/// stays observable through its realized job count.
pub async fn submit_descriptors(
    scheduler: &dyn Scheduler,
    descriptors: &[JobDescriptor],
    group_size: usize,
    retry: &RetryPolicy,
) -> SubmissionReport {
    let mut report = SubmissionReport::default();
    for (index, group) in descriptors.chunks(group_size.max(1)).enumerate() {
        report.groups_total += 1;
        let outcome = retry
            .run(
                || scheduler.apply_group(group),
                |_err: &SchedulerError| RetryDisposition::Retry,
            )
            .await;
        match outcome {
            Ok(names) => {
                info!(group = index, jobs = names.len(), "Applied submission group");
                report.jobs_submitted += names.len();
                report.job_names.extend(names);
            }
            Err(err) => {
                error!(
                    group = index,
                    error = %err.into_inner(),
                    "Submission group failed after retries"
                );
                report.groups_failed += 1;
            }
        }
    }
    report
}

/// Submit a whole run: persist the run configuration, render descriptors
/// from the manifest, apply them group by group, record the realized job
/// count, and only then scale the worker pool.
pub async fn submit_run(
    scheduler: &dyn Scheduler,
    store: &dyn ObjectStore,
    cfg: &RunConfig,
    template: &str,
    manifest: &[String],
    extra_vars: &HashMap<String, String>,
) -> Result<SubmissionReport, SchedulerError> {
    let cfg_json = cfg
        .to_json()
        .map_err(SchedulerError::Json)?;
    store
        .put_object(
            &paths::metadata_file(&cfg.results, paths::RUN_CONFIG_FILE),
            cfg_json.into_bytes(),
        )
        .await?;

    let descriptors = render_descriptors(template, manifest, &cfg.results, extra_vars);
    info!(
        jobs = descriptors.len(),
        group_size = cfg.group_size,
        "Submitting job descriptors"
    );

    let retry = RetryPolicy::new(
        cfg.submit_retries,
        Duration::from_millis(cfg.submit_retry_delay_ms),
    );
    let report = submit_descriptors(scheduler, &descriptors, cfg.group_size, &retry).await;

    // The realized count is durable state: reconciliation compares against
    // it long after this process is gone.
    store
        .put_object(
            &paths::metadata_file(&cfg.results, paths::NUM_JOBS_FILE),
            report.jobs_submitted.to_string().into_bytes(),
        )
        .await?;

    if !report.is_complete() {
        warn!(
            groups_failed = report.groups_failed,
            jobs_submitted = report.jobs_submitted,
            "Partial submission recorded"
        );
    }

    if report.jobs_submitted > 0 {
        if let Some(pool) = &cfg.worker_pool {
            scheduler.scale_pool(pool, cfg.target_nodes).await?;
            info!(pool = %pool, replicas = cfg.target_nodes, "Scaled worker pool");
        }
    }

    Ok(report)
}
