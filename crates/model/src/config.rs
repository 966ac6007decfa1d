use crate::split::SplitMode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DFLT_GROUP_SIZE: usize = 100;
pub const DFLT_SUBMIT_RETRIES: usize = 5;
pub const DFLT_SUBMIT_RETRY_DELAY_MS: u64 = 2_000;
pub const DFLT_JOB_SELECTOR: &str = "app=seqferry-search";
pub const DFLT_SUBMIT_SELECTOR: &str = "app=seqferry-submit";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to deserialize run configuration: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("Invalid run configuration: {0}")]
    Invalid(String),
}

/// Settings for one run, persisted as JSON under the metadata prefix at
/// submit time so that status and reconciliation tools can operate with
/// nothing but the results location in hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Results location; one run per results-location identity.
    pub results: String,
    /// Name of the backing cluster, used in log messages only.
    pub cluster_name: String,
    #[serde(default)]
    pub split: SplitMode,
    /// Label selector matching the per-batch search jobs.
    #[serde(default = "default_job_selector")]
    pub job_selector: String,
    /// Label selector matching the job that performed the submission.
    #[serde(default = "default_submit_selector")]
    pub submit_selector: String,
    /// Descriptors per bulk-apply group.
    #[serde(default = "default_group_size")]
    pub group_size: usize,
    #[serde(default = "default_submit_retries")]
    pub submit_retries: usize,
    #[serde(default = "default_submit_retry_delay_ms")]
    pub submit_retry_delay_ms: u64,
    /// Worker pool size applied once submission has succeeded.
    pub target_nodes: u32,
    /// Name of the scalable worker pool object; pool scaling is skipped
    /// when absent.
    #[serde(default)]
    pub worker_pool: Option<String>,
}

fn default_job_selector() -> String {
    DFLT_JOB_SELECTOR.to_string()
}

fn default_submit_selector() -> String {
    DFLT_SUBMIT_SELECTOR.to_string()
}

fn default_group_size() -> usize {
    DFLT_GROUP_SIZE
}

fn default_submit_retries() -> usize {
    DFLT_SUBMIT_RETRIES
}

fn default_submit_retry_delay_ms() -> u64 {
    DFLT_SUBMIT_RETRY_DELAY_MS
}

impl RunConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let cfg: RunConfig = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.results.is_empty() {
            return Err(ConfigError::Invalid("results location is empty".into()));
        }
        if self.group_size == 0 {
            return Err(ConfigError::Invalid("group size must be positive".into()));
        }
        match self.split {
            SplitMode::Strict { batch_len } if batch_len == 0 => Err(ConfigError::Invalid(
                "strict batch length must be positive".into(),
            )),
            SplitMode::Proportional { parts } if parts == 0 => Err(ConfigError::Invalid(
                "proportional part count must be positive".into(),
            )),
            _ => Ok(()),
        }
    }
}
