//! Document store contract.
//!
//! The training service never talks to a concrete database. It depends on
//! [`DocumentStore`], which models a managed document database with named
//! collections, live subscriptions and one-shot writes.

mod path;

pub use path::DocumentPath;

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Field map of a single document.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// One document inside a live snapshot batch.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    /// Document identity within its collection
    pub id: String,
    /// Document fields
    pub data: Fields,
}

impl DocumentSnapshot {
    pub fn new(id: impl Into<String>, data: Fields) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// Live stream of full collection snapshots, including document identities.
///
/// Each item is the whole collection at that point in time. An `Err` item
/// reports a transport failure; the stream may keep yielding afterwards.
pub type SnapshotStream = BoxStream<'static, Result<Vec<DocumentSnapshot>>>;

/// Live stream of full collection contents as plain values (no identities).
pub type ValueStream = BoxStream<'static, Result<Vec<serde_json::Value>>>;

/// An abstract client for a document database.
///
/// Implementations decide where documents live (memory, a file, a remote
/// service). Subscriptions end when the returned stream is dropped.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Subscribes to live snapshot changes of a collection.
    ///
    /// # Returns
    ///
    /// - `Ok(SnapshotStream)`: Subscription established
    /// - `Err(_)`: The subscription could not be opened
    async fn snapshot_changes(&self, collection: &str) -> Result<SnapshotStream>;

    /// Subscribes to live value changes of a collection.
    async fn value_changes(&self, collection: &str) -> Result<ValueStream>;

    /// Merges `fields` into the document at `path`.
    ///
    /// Fields not yet present on the document are created.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Document updated
    /// - `Err(FitrackError::NotFound)`: No document at `path`
    /// - `Err(_)`: Other storage failure
    async fn update(&self, path: &DocumentPath, fields: Fields) -> Result<()>;

    /// Appends a new document to a collection.
    ///
    /// # Returns
    ///
    /// The id the store assigned to the new document.
    async fn add(&self, collection: &str, record: Fields) -> Result<String>;
}
