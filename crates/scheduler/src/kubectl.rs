use crate::api::Scheduler;
use crate::descriptor::JobDescriptor;
use crate::error::SchedulerError;
use async_trait::async_trait;
use model::counts::JobCounts;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

/// Scheduler implementation that shells out to `kubectl`.
pub struct KubectlScheduler {
    context: Option<String>,
    namespace: Option<String>,
}

impl KubectlScheduler {
    pub fn new(context: Option<String>, namespace: Option<String>) -> Self {
        KubectlScheduler { context, namespace }
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(context) = &self.context {
            args.push(format!("--context={context}"));
        }
        if let Some(namespace) = &self.namespace {
            args.push(format!("--namespace={namespace}"));
        }
        args
    }

    async fn run(&self, args: &[String]) -> Result<String, SchedulerError> {
        debug!(args = ?args, "kubectl");
        let output = Command::new("kubectl")
            .args(self.base_args())
            .args(args)
            .output()
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(SchedulerError::Query(format!(
                "kubectl {} failed: {stderr}",
                args.first().map(String::as_str).unwrap_or("")
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Job names out of `kubectl apply -o json`: either a single object or
    /// a `List` with `items`.
    fn parse_applied_names(raw: &str) -> Result<Vec<String>, SchedulerError> {
        let value: Value = serde_json::from_str(raw)?;
        let name_of = |item: &Value| {
            item.pointer("/metadata/name")
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        match value.get("items").and_then(Value::as_array) {
            Some(items) => Ok(items.iter().filter_map(name_of).collect()),
            None => Ok(name_of(&value).into_iter().collect()),
        }
    }
}

#[async_trait]
impl Scheduler for KubectlScheduler {
    async fn apply_group(&self, group: &[JobDescriptor]) -> Result<Vec<String>, SchedulerError> {
        let dir = tempfile::tempdir()?;
        for descriptor in group {
            std::fs::write(dir.path().join(&descriptor.name), &descriptor.body)?;
        }
        let raw = self
            .run(&[
                "apply".to_string(),
                "-f".to_string(),
                dir.path().to_string_lossy().to_string(),
                "-o".to_string(),
                "json".to_string(),
            ])
            .await
            .map_err(|err| SchedulerError::Apply(err.to_string()))?;
        Self::parse_applied_names(&raw)
    }

    async fn count_jobs(&self, selector: &str) -> Result<JobCounts, SchedulerError> {
        let mut counts = JobCounts::default();

        // Jobs report Complete/Failed through their first condition;
        // anything else is still pending or running.
        let jobs = self
            .run(&[
                "get".to_string(),
                "jobs".to_string(),
                "-o".to_string(),
                "custom-columns=STATUS:.status.conditions[0].type".to_string(),
                "-l".to_string(),
                selector.to_string(),
            ])
            .await?;
        for line in jobs.lines() {
            if line.is_empty() || line.starts_with("STATUS") {
                continue;
            }
            if line.starts_with("Complete") {
                counts.succeeded += 1;
            } else if line.starts_with("Failed") {
                counts.failed += 1;
            } else {
                counts.pending += 1;
            }
        }

        let pods = self
            .run(&[
                "get".to_string(),
                "pods".to_string(),
                "-o".to_string(),
                "custom-columns=STATUS:.status.phase".to_string(),
                "-l".to_string(),
                selector.to_string(),
            ])
            .await?;
        for line in pods.lines() {
            if line == "Running" {
                counts.running += 1;
            }
        }

        // Running jobs were counted twice, as running and pending.
        counts.pending = counts.pending.saturating_sub(counts.running);
        Ok(counts)
    }

    async fn delete_resources(&self, selector: &str) -> Result<(), SchedulerError> {
        self.run(&[
            "delete".to_string(),
            "jobs,pods,persistentvolumeclaims,persistentvolumes".to_string(),
            "-l".to_string(),
            selector.to_string(),
            "--ignore-not-found=true".to_string(),
        ])
        .await?;
        Ok(())
    }

    async fn scale_pool(&self, pool: &str, replicas: u32) -> Result<(), SchedulerError> {
        self.run(&[
            "scale".to_string(),
            format!("--replicas={replicas}"),
            pool.to_string(),
        ])
        .await
        .map_err(|err| SchedulerError::Scale(err.to_string()))?;
        Ok(())
    }
}
