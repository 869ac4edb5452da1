//! Domain layer for FITRACK.
//!
//! Holds the exercise models, the configuration model and the contracts of
//! the collaborators the training service depends on (document store,
//! notification sink, UI state dispatcher).

pub mod config;
pub mod error;
pub mod exercise;
pub mod store;
pub mod ui;

// Re-export common error type
pub use error::{FitrackError, Result};
