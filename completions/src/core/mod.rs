//! Completions job core logic

pub mod generator;
pub mod job;
pub mod publisher;
pub mod utils;

pub use generator::ResponseGenerator;
pub use job::{CompletionJob, run_job};
pub use publisher::RetryingPublisher;
pub use utils::{derive_destination_id, partition_batches, repo_name, retry_delay};
