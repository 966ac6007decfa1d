use model::config::ConfigError;
use scheduler::SchedulerError;
use storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A scheduler query or teardown call failed. Transient: callers must
    /// not interpret this as any particular run phase.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
