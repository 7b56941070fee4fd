//! Shared types for the paired-completions job
//!
//! Holds the output table schema, the publish destination and failure taxonomy,
//! and the tracing setup used by every crate in the workspace.

pub mod types;
pub mod errors;
pub mod logging;

pub use types::*;
pub use errors::*;
