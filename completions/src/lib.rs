//! Paired completions job
//!
//! Samples prompts from a hub dataset, generates one completion per prompt from a
//! base model and from its fine-tuned counterpart, and publishes the paired table
//! as a new hub dataset.

pub mod config;
pub mod core;
pub mod error;
pub mod services;
pub mod traits;
pub mod types;

// Re-export main types
pub use config::{JobConfig, ServiceEndpoints};
pub use core::{CompletionJob, ResponseGenerator, RetryingPublisher, run_job};
pub use error::{CompletionsError, CompletionsResult};
pub use traits::*;
pub use types::*;
