//! Completions job service implementations

pub mod hub_publisher;
pub mod model_backend;
pub mod prompt_source;

#[cfg(test)]
pub mod tests;

pub use hub_publisher::*;
pub use model_backend::*;
pub use prompt_source::*;
