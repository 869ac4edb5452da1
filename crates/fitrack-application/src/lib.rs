//! Application layer for FITRACK.
//!
//! This crate provides the services that coordinate the domain models with
//! the store and UI collaborators defined in `fitrack-core`.

pub mod training;

pub use training::{LAST_SELECTED_FIELD, TrainingService};
