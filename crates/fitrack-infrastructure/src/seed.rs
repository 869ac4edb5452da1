//! Demo catalog used to populate an empty store.

use crate::memory_store::InMemoryDocumentStore;
use fitrack_core::error::Result;
use fitrack_core::store::{DocumentStore, Fields};
use serde_json::json;

/// Exercises written by [`seed_catalog`]: name, duration in seconds, calories.
pub const DEFAULT_CATALOG: &[(&str, f64, f64)] = &[
    ("Crunches", 30.0, 8.0),
    ("Touch Toes", 180.0, 15.0),
    ("Side Lunges", 120.0, 18.0),
    ("Burpees", 60.0, 8.0),
];

/// Adds the default catalog to `collection` unless it already has entries.
///
/// # Returns
///
/// The ids of the documents created (empty when nothing was written).
pub async fn seed_catalog(store: &InMemoryDocumentStore, collection: &str) -> Result<Vec<String>> {
    let existing = store.documents(collection)?.len();
    if existing > 0 {
        tracing::info!(
            "[Seed] '{}' already has {} exercises, skipping",
            collection,
            existing
        );
        return Ok(Vec::new());
    }

    let mut ids = Vec::with_capacity(DEFAULT_CATALOG.len());
    for (name, duration, calories) in DEFAULT_CATALOG {
        let mut fields = Fields::new();
        fields.insert("name".to_string(), json!(name));
        fields.insert("duration".to_string(), json!(duration));
        fields.insert("calories".to_string(), json!(calories));
        ids.push(store.add(collection, fields).await?);
    }

    tracing::info!("[Seed] Added {} exercises to '{}'", ids.len(), collection);
    Ok(ids)
}
