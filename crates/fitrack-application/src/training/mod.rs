//! Training session services.
//!
//! This module contains the application-layer coordinator for the exercise
//! session lifecycle and the plumbing for its live store subscriptions.

mod listeners;
mod service;
mod subscription;

pub use service::{LAST_SELECTED_FIELD, TrainingService};
