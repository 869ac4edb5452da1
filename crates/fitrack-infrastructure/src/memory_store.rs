//! In-process document store with live subscriptions.
//!
//! `InMemoryDocumentStore` emulates a managed document database: named
//! collections, store-assigned ids, field-merging updates and subscriptions
//! that receive the full collection after every write. It can optionally
//! persist the whole database to a JSON file.

use crate::storage::AtomicJsonFile;
use async_trait::async_trait;
use fitrack_core::error::{FitrackError, Result};
use fitrack_core::store::{
    DocumentPath, DocumentSnapshot, DocumentStore, Fields, SnapshotStream, ValueStream,
};
use futures::StreamExt;
use futures::channel::mpsc::{UnboundedSender, unbounded};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;
use uuid::Uuid;

/// Persisted form of the database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Database {
    #[serde(default)]
    collections: BTreeMap<String, Vec<StoredDocument>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredDocument {
    id: String,
    fields: Fields,
}

impl Database {
    fn snapshots(&self, collection: &str) -> Vec<DocumentSnapshot> {
        self.collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|doc| DocumentSnapshot::new(doc.id.clone(), doc.fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn values(&self, collection: &str) -> Vec<serde_json::Value> {
        self.collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|doc| serde_json::Value::Object(doc.fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Live subscribers of one collection.
#[derive(Default)]
struct Watchers {
    snapshots: Vec<UnboundedSender<Result<Vec<DocumentSnapshot>>>>,
    values: Vec<UnboundedSender<Result<Vec<serde_json::Value>>>>,
}

impl Watchers {
    fn notify(&mut self, database: &Database, collection: &str) {
        if !self.snapshots.is_empty() {
            let snapshot = database.snapshots(collection);
            self.snapshots
                .retain(|tx| tx.unbounded_send(Ok(snapshot.clone())).is_ok());
        }
        if !self.values.is_empty() {
            let values = database.values(collection);
            self.values
                .retain(|tx| tx.unbounded_send(Ok(values.clone())).is_ok());
        }
    }

    fn fail(&mut self, error: &FitrackError) {
        self.snapshots
            .retain(|tx| tx.unbounded_send(Err(error.clone())).is_ok());
        self.values
            .retain(|tx| tx.unbounded_send(Err(error.clone())).is_ok());
    }

    fn len(&self) -> usize {
        self.snapshots.iter().filter(|tx| !tx.is_closed()).count()
            + self.values.iter().filter(|tx| !tx.is_closed()).count()
    }
}

#[derive(Default)]
struct Inner {
    database: Database,
    watchers: HashMap<String, Watchers>,
}

/// A [`DocumentStore`] kept in process memory.
///
/// Every subscription first receives the current contents of its collection,
/// then a full snapshot after each write to that collection. Subscriptions
/// end when their stream is dropped.
pub struct InMemoryDocumentStore {
    inner: Mutex<Inner>,
    file: Option<AtomicJsonFile<Database>>,
}

impl InMemoryDocumentStore {
    /// Creates an empty store that lives only as long as the process.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            file: None,
        }
    }

    /// Opens a store backed by a JSON file.
    ///
    /// The file is loaded if it exists; every successful write saves the
    /// whole database back to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: PathBuf) -> Result<Self> {
        let file = AtomicJsonFile::<Database>::new(path);
        let database = file.load()?.unwrap_or_default();
        tracing::debug!(
            "[InMemoryDocumentStore] Opened {:?} with {} collections",
            file.path(),
            database.collections.len()
        );

        Ok(Self {
            inner: Mutex::new(Inner {
                database,
                watchers: HashMap::new(),
            }),
            file: Some(file),
        })
    }

    /// Returns the current documents of a collection.
    pub fn documents(&self, collection: &str) -> Result<Vec<DocumentSnapshot>> {
        let inner = self.lock()?;
        Ok(inner.database.snapshots(collection))
    }

    /// Delivers `error` to every live subscriber of `collection`.
    ///
    /// Subscriptions stay open; this mirrors a transient transport fault.
    pub fn emit_error(&self, collection: &str, error: FitrackError) -> Result<()> {
        let mut inner = self.lock()?;
        if let Some(watchers) = inner.watchers.get_mut(collection) {
            watchers.fail(&error);
        }
        Ok(())
    }

    /// Number of live subscriptions on `collection`.
    pub fn subscriber_count(&self, collection: &str) -> usize {
        self.lock()
            .map(|inner| inner.watchers.get(collection).map_or(0, Watchers::len))
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| FitrackError::data_access(format!("store lock poisoned: {}", e)))
    }

    /// Applies `change` to a copy of the database, persists it, then commits
    /// and notifies the collection's subscribers.
    ///
    /// A file-backed store applies `change` to the file's current contents
    /// under the file lock, so writes from other processes sharing the file
    /// are kept.
    fn write<R>(
        &self,
        collection: &str,
        change: impl FnOnce(&mut Database) -> Result<R>,
    ) -> Result<R> {
        let mut inner = self.lock()?;

        let (next, result) = match &self.file {
            Some(file) => file.update(change)?,
            None => {
                let mut next = inner.database.clone();
                let result = change(&mut next)?;
                (next, result)
            }
        };

        let Inner { database, watchers } = &mut *inner;
        *database = next;
        if let Some(collection_watchers) = watchers.get_mut(collection) {
            collection_watchers.notify(database, collection);
        }
        Ok(result)
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn snapshot_changes(&self, collection: &str) -> Result<SnapshotStream> {
        let (tx, rx) = unbounded();
        let mut inner = self.lock()?;
        let initial = inner.database.snapshots(collection);
        // The receiver is alive here, so the initial send cannot fail
        let _ = tx.unbounded_send(Ok(initial));
        inner
            .watchers
            .entry(collection.to_string())
            .or_default()
            .snapshots
            .push(tx);
        Ok(rx.boxed())
    }

    async fn value_changes(&self, collection: &str) -> Result<ValueStream> {
        let (tx, rx) = unbounded();
        let mut inner = self.lock()?;
        let _ = tx.unbounded_send(Ok(inner.database.values(collection)));
        inner
            .watchers
            .entry(collection.to_string())
            .or_default()
            .values
            .push(tx);
        Ok(rx.boxed())
    }

    async fn update(&self, path: &DocumentPath, fields: Fields) -> Result<()> {
        self.write(path.collection(), |database| {
            let document = database
                .collections
                .get_mut(path.collection())
                .and_then(|docs| docs.iter_mut().find(|doc| doc.id == path.id()))
                .ok_or_else(|| FitrackError::not_found("Document", path.to_string()))?;

            for (key, value) in fields {
                document.fields.insert(key, value);
            }
            Ok(())
        })
    }

    async fn add(&self, collection: &str, record: Fields) -> Result<String> {
        let id = Uuid::new_v4().simple().to_string();
        self.write(collection, |database| {
            database
                .collections
                .entry(collection.to_string())
                .or_default()
                .push(StoredDocument {
                    id: id.clone(),
                    fields: record,
                });
            Ok(id.clone())
        })
    }
}
