pub mod api;
pub mod descriptor;
pub mod error;
pub mod kubectl;
pub mod retry;
pub mod submit;
pub mod template;

pub use api::Scheduler;
pub use descriptor::{JobDescriptor, render_descriptors};
pub use error::SchedulerError;
pub use kubectl::KubectlScheduler;
pub use retry::{RetryDisposition, RetryError, RetryPolicy};
pub use submit::{SubmissionReport, submit_descriptors, submit_run};
pub use template::substitute_params;
