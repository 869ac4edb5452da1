//! Infrastructure layer for FITRACK.
//!
//! Concrete implementations of the collaborators declared in `fitrack-core`:
//! a document store, UI state and notification handling, configuration
//! loading and platform paths.

pub mod config_service;
pub mod memory_store;
pub mod paths;
pub mod seed;
pub mod storage;
pub mod ui_service;

pub use crate::config_service::ConfigService;
pub use crate::memory_store::InMemoryDocumentStore;
pub use crate::paths::FitrackPaths;
pub use crate::ui_service::UiService;
