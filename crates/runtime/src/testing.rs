//! Shared mocks for the aggregator and janitor tests.

use async_trait::async_trait;
use model::config::RunConfig;
use model::counts::JobCounts;
use model::split::SplitMode;
use scheduler::{JobDescriptor, Scheduler, SchedulerError};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn test_config(results: &str) -> RunConfig {
    RunConfig {
        results: results.to_string(),
        cluster_name: "seqferry-test".to_string(),
        split: SplitMode::Strict { batch_len: 100 },
        job_selector: "app=seqferry-search".to_string(),
        submit_selector: "app=seqferry-submit".to_string(),
        group_size: 100,
        submit_retries: 2,
        submit_retry_delay_ms: 0,
        target_nodes: 2,
        worker_pool: None,
    }
}

/// Scheduler returning canned counts; records deletions and scale calls.
pub struct StaticScheduler {
    job_counts: JobCounts,
    submit: JobCounts,
    fail_queries: bool,
    query_calls: AtomicUsize,
    deleted: Mutex<Vec<String>>,
}

impl StaticScheduler {
    pub fn with_job_counts(job_counts: JobCounts) -> Self {
        StaticScheduler {
            job_counts,
            submit: JobCounts::default(),
            fail_queries: false,
            query_calls: AtomicUsize::new(0),
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub fn submit_counts(mut self, submit: JobCounts) -> Self {
        self.submit = submit;
        self
    }

    pub fn failing() -> Self {
        let mut scheduler = Self::with_job_counts(JobCounts::default());
        scheduler.fail_queries = true;
        scheduler
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn deleted_selectors(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Scheduler for StaticScheduler {
    async fn apply_group(&self, group: &[JobDescriptor]) -> Result<Vec<String>, SchedulerError> {
        Ok(group.iter().map(|d| d.name.clone()).collect())
    }

    async fn count_jobs(&self, selector: &str) -> Result<JobCounts, SchedulerError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries {
            return Err(SchedulerError::Query("connection refused".to_string()));
        }
        if selector.contains("submit") {
            Ok(self.submit)
        } else {
            Ok(self.job_counts)
        }
    }

    async fn delete_resources(&self, selector: &str) -> Result<(), SchedulerError> {
        self.deleted.lock().unwrap().push(selector.to_string());
        Ok(())
    }

    async fn scale_pool(&self, _pool: &str, _replicas: u32) -> Result<(), SchedulerError> {
        Ok(())
    }
}
