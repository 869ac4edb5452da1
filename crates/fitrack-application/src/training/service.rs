//! Training service: the exercise session coordinator.
//!
//! `TrainingService` keeps the exercise catalog in sync with the store, owns
//! the running exercise and writes finished sessions to the history
//! collection. Consumers observe it through three listener channels.

use super::listeners::Listeners;
use super::subscription::StoreSubscription;
use chrono::Utc;
use fitrack_core::config::TrainingConfig;
use fitrack_core::error::{FitrackError, Result};
use fitrack_core::exercise::{Exercise, FinishedExercise, RunningExercise};
use fitrack_core::store::{DocumentPath, DocumentSnapshot, DocumentStore, Fields};
use fitrack_core::ui::{NotificationSink, UiAction, UiDispatcher};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// Field written onto a catalog document whenever it is selected.
pub const LAST_SELECTED_FIELD: &str = "lastSelected";

/// State exclusively owned by the service.
#[derive(Debug, Default)]
struct TrainingState {
    available_exercises: Vec<Exercise>,
    running_exercise: Option<RunningExercise>,
}

/// Coordinates the exercise session lifecycle against a document store.
///
/// # Channels
///
/// - `exercise_changed`: the running exercise, or `None` when a session ends
/// - `exercises_changed`: the full catalog after every store snapshot
/// - `finished_exercises_changed`: the full history after every store change
///
/// Every receiver has its own unbounded queue and sees every value sent
/// after it subscribed, in order. Channels do not replay earlier values.
///
/// # Failures
///
/// Store failures are logged and never returned to the caller. A failing
/// catalog subscription additionally resets the loading indicator and shows a
/// notification.
pub struct TrainingService {
    store: Arc<dyn DocumentStore>,
    notifications: Arc<dyn NotificationSink>,
    ui: Arc<dyn UiDispatcher>,
    config: TrainingConfig,
    state: Arc<RwLock<TrainingState>>,
    exercise_changed: Arc<Listeners<Option<Exercise>>>,
    exercises_changed: Arc<Listeners<Vec<Exercise>>>,
    finished_exercises_changed: Arc<Listeners<Vec<FinishedExercise>>>,
    subscriptions: Mutex<Vec<StoreSubscription>>,
    pending_writes: Mutex<Vec<JoinHandle<()>>>,
}

impl TrainingService {
    /// Creates a new `TrainingService`.
    ///
    /// # Arguments
    ///
    /// * `store` - Document store holding both exercise collections
    /// * `notifications` - Sink for user-facing messages
    /// * `ui` - Dispatcher for the global loading indicator
    /// * `config` - Collection names, messages and channel sizes
    pub fn new(
        store: Arc<dyn DocumentStore>,
        notifications: Arc<dyn NotificationSink>,
        ui: Arc<dyn UiDispatcher>,
        config: TrainingConfig,
    ) -> Self {
        Self {
            store,
            notifications,
            ui,
            config,
            state: Arc::new(RwLock::new(TrainingState::default())),
            exercise_changed: Arc::new(Listeners::new()),
            exercises_changed: Arc::new(Listeners::new()),
            finished_exercises_changed: Arc::new(Listeners::new()),
            subscriptions: Mutex::new(Vec::new()),
            pending_writes: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn subscribe_exercise_changed(&self) -> UnboundedReceiver<Option<Exercise>> {
        self.exercise_changed.subscribe()
    }

    pub fn subscribe_exercises_changed(&self) -> UnboundedReceiver<Vec<Exercise>> {
        self.exercises_changed.subscribe()
    }

    pub fn subscribe_finished_exercises_changed(
        &self,
    ) -> UnboundedReceiver<Vec<FinishedExercise>> {
        self.finished_exercises_changed.subscribe()
    }

    /// Subscribes to the catalog collection.
    ///
    /// Every snapshot replaces the catalog and is broadcast on
    /// `exercises_changed`. The loading indicator is started before
    /// subscribing and stopped on every snapshot or failure.
    pub async fn fetch_available_exercises(&self) {
        self.ui.dispatch(UiAction::StartLoading);

        let listener = Arc::new(CatalogListener {
            state: self.state.clone(),
            exercises_changed: self.exercises_changed.clone(),
            notifications: self.notifications.clone(),
            ui: self.ui.clone(),
            config: self.config.clone(),
        });

        let collection = self.config.available_collection.as_str();
        let stream = match self.store.snapshot_changes(collection).await {
            Ok(stream) => stream,
            Err(e) => {
                listener.on_failure(&e);
                return;
            }
        };

        let subscription = StoreSubscription::spawn(collection, stream, move |item| {
            let listener = listener.clone();
            async move { listener.on_item(item).await }
        });
        self.subscriptions.lock().await.push(subscription);
        tracing::debug!(target: "training", "[TrainingService] Subscribed to '{}'", collection);
    }

    /// Starts a session for the catalog entry with `selected_id`.
    ///
    /// On a hit the catalog document is annotated with the selection time in
    /// the background and a copy of the entry is broadcast. An unknown id
    /// clears the running exercise and broadcasts `None`; it is not an error.
    ///
    /// A session that is already running is replaced without being recorded.
    ///
    /// # Returns
    ///
    /// A copy of the started exercise, or `None` if the id is not in the
    /// catalog.
    pub async fn start_exercise(&self, selected_id: &str) -> Option<Exercise> {
        let started = {
            let mut state = self.state.write().await;

            if let Some(previous) = &state.running_exercise {
                tracing::warn!(
                    target: "training",
                    "[TrainingService] Replacing running exercise '{}' without recording it",
                    previous.exercise.name
                );
            }

            let selected = state
                .available_exercises
                .iter()
                .find(|exercise| exercise.id == selected_id)
                .cloned();

            state.running_exercise = selected
                .clone()
                .map(|exercise| RunningExercise::start(exercise, Utc::now()));
            selected
        };

        match &started {
            Some(exercise) => {
                self.annotate_selection(&exercise.id).await;
                tracing::info!(
                    target: "training",
                    "[TrainingService] Started exercise '{}' ({})",
                    exercise.name,
                    exercise.id
                );
            }
            None => {
                tracing::warn!(
                    target: "training",
                    "[TrainingService] No exercise with id '{}' in catalog",
                    selected_id
                );
            }
        }

        self.exercise_changed.send(started.clone());
        started
    }

    /// Completes the running exercise.
    ///
    /// The finished record is appended to the history collection in the
    /// background; the running exercise is cleared and `None` is broadcast
    /// regardless of whether that write succeeds.
    ///
    /// # Errors
    ///
    /// Returns `FitrackError::NoRunningExercise` if no session is active.
    /// Nothing is written or broadcast in that case.
    pub async fn complete_exercise(&self) -> Result<FinishedExercise> {
        self.finish(|running| running.complete(Utc::now())).await
    }

    /// Cancels the running exercise after `progress` percent of it elapsed.
    ///
    /// Duration and calories of the record are scaled by `progress / 100`
    /// (clamped to `[0, 100]`). Otherwise behaves like
    /// [`complete_exercise`](Self::complete_exercise).
    pub async fn cancel_exercise(&self, progress: f64) -> Result<FinishedExercise> {
        self.finish(|running| running.cancel(progress, Utc::now())).await
    }

    /// Returns a copy of the running exercise, if any.
    pub async fn get_running_exercise(&self) -> Option<Exercise> {
        let state = self.state.read().await;
        state
            .running_exercise
            .as_ref()
            .map(|running| running.exercise.clone())
    }

    /// Returns a copy of the running session including its start time.
    pub async fn running_session(&self) -> Option<RunningExercise> {
        self.state.read().await.running_exercise.clone()
    }

    /// Returns a copy of the current catalog.
    pub async fn available_exercises(&self) -> Vec<Exercise> {
        self.state.read().await.available_exercises.clone()
    }

    /// Subscribes to the history collection.
    ///
    /// Every change broadcasts the full list of finished exercises. Failures
    /// are logged only.
    pub async fn fetch_completed_or_cancelled_exercises(&self) {
        let finished_exercises_changed = self.finished_exercises_changed.clone();
        let collection = self.config.finished_collection.clone();

        let stream = match self.store.value_changes(&collection).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(
                    target: "training",
                    "[TrainingService] Failed to subscribe to '{}': {}",
                    collection,
                    e
                );
                return;
            }
        };

        let name = collection.clone();
        let subscription = StoreSubscription::spawn(&collection, stream, move |item| {
            let sender = finished_exercises_changed.clone();
            let name = name.clone();
            async move {
                match item {
                    Ok(values) => {
                        sender.send(parse_finished(&name, values));
                    }
                    Err(e) => {
                        tracing::error!(
                            target: "training",
                            "[TrainingService] History subscription error: {}",
                            e
                        );
                    }
                }
            }
        });
        self.subscriptions.lock().await.push(subscription);
    }

    /// Terminates every live store subscription held by this service.
    ///
    /// Safe to call any number of times. Writes already in flight are not
    /// affected.
    pub async fn cancel_subscriptions(&self) {
        let mut subscriptions = self.subscriptions.lock().await;
        for subscription in subscriptions.drain(..) {
            tracing::debug!(
                target: "training",
                "[TrainingService] Cancelling subscription to '{}'",
                subscription.collection()
            );
            subscription.cancel();
        }
    }

    /// Number of store subscriptions that are still live.
    pub async fn active_subscriptions(&self) -> usize {
        let subscriptions = self.subscriptions.lock().await;
        subscriptions.iter().filter(|s| s.is_active()).count()
    }

    /// Waits for every background write issued so far to finish.
    ///
    /// Write failures were already logged when they happened and are not
    /// reported here.
    pub async fn flush_pending_writes(&self) {
        let pending = std::mem::take(&mut *self.pending_writes.lock().await);
        for handle in pending {
            if let Err(e) = handle.await {
                tracing::error!(target: "training", "[TrainingService] Write task failed: {}", e);
            }
        }
    }

    async fn finish<F>(&self, freeze: F) -> Result<FinishedExercise>
    where
        F: FnOnce(&RunningExercise) -> FinishedExercise,
    {
        let finished = {
            let mut state = self.state.write().await;
            let running = state.running_exercise.take().ok_or_else(|| {
                tracing::warn!(
                    target: "training",
                    "[TrainingService] Finish requested but no exercise is running"
                );
                FitrackError::NoRunningExercise
            })?;
            freeze(&running)
        };

        self.add_to_database(&finished).await;
        self.exercise_changed.send(None);

        tracing::info!(
            target: "training",
            "[TrainingService] Exercise '{}' {}",
            finished.name,
            finished.state
        );
        Ok(finished)
    }

    async fn annotate_selection(&self, exercise_id: &str) {
        let store = self.store.clone();
        let path = DocumentPath::new(self.config.available_collection.clone(), exercise_id);
        let mut fields = Fields::new();
        fields.insert(
            LAST_SELECTED_FIELD.to_string(),
            serde_json::Value::String(Utc::now().to_rfc3339()),
        );

        self.spawn_write(async move {
            if let Err(e) = store.update(&path, fields).await {
                tracing::error!(
                    target: "training",
                    "[TrainingService] Failed to annotate '{}': {}",
                    path,
                    e
                );
            }
        })
        .await;
    }

    async fn add_to_database(&self, exercise: &FinishedExercise) {
        let fields = match exercise.to_fields() {
            Ok(fields) => fields,
            Err(e) => {
                tracing::error!(
                    target: "training",
                    "[TrainingService] Cannot encode exercise '{}': {}",
                    exercise.name,
                    e
                );
                return;
            }
        };

        let store = self.store.clone();
        let collection = self.config.finished_collection.clone();
        let name = exercise.name.clone();

        self.spawn_write(async move {
            match store.add(&collection, fields).await {
                Ok(id) => tracing::info!(
                    target: "training",
                    "[TrainingService] Exercise '{}' stored as {}/{}",
                    name,
                    collection,
                    id
                ),
                Err(e) => tracing::error!(
                    target: "training",
                    "[TrainingService] Failed to store exercise '{}': {}",
                    name,
                    e
                ),
            }
        })
        .await;
    }

    /// Launches a fire-and-forget write. The write keeps running even if the
    /// service is dropped.
    async fn spawn_write<F>(&self, write: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.pending_writes.lock().await;
        pending.retain(|handle| !handle.is_finished());
        pending.push(tokio::spawn(write));
    }
}

impl Drop for TrainingService {
    fn drop(&mut self) {
        for subscription in self.subscriptions.get_mut().drain(..) {
            subscription.cancel();
        }
    }
}

/// Applies catalog snapshots to the service state.
struct CatalogListener {
    state: Arc<RwLock<TrainingState>>,
    exercises_changed: Arc<Listeners<Vec<Exercise>>>,
    notifications: Arc<dyn NotificationSink>,
    ui: Arc<dyn UiDispatcher>,
    config: TrainingConfig,
}

impl CatalogListener {
    async fn on_item(&self, item: Result<Vec<DocumentSnapshot>>) {
        match item {
            Ok(documents) => {
                let exercises = map_catalog(&documents);
                {
                    let mut state = self.state.write().await;
                    state.available_exercises = exercises.clone();
                }
                tracing::debug!(
                    target: "training",
                    "[TrainingService] Catalog updated: {} exercises",
                    exercises.len()
                );
                self.exercises_changed.send(exercises);
                self.ui.dispatch(UiAction::StopLoading);
            }
            Err(e) => self.on_failure(&e),
        }
    }

    fn on_failure(&self, error: &FitrackError) {
        tracing::error!(
            target: "training",
            "[TrainingService] Fetching exercises failed: {}",
            error
        );
        self.ui.dispatch(UiAction::StopLoading);
        self.notifications.show_snackbar(
            &self.config.fetch_failed_message,
            None,
            self.config.notification_duration(),
        );
    }
}

/// Maps a catalog snapshot, skipping documents that are not exercises.
fn map_catalog(documents: &[DocumentSnapshot]) -> Vec<Exercise> {
    documents
        .iter()
        .filter_map(|doc| match Exercise::from_snapshot(doc) {
            Ok(exercise) => Some(exercise),
            Err(e) => {
                tracing::warn!(target: "training", "[TrainingService] Skipping catalog entry: {}", e);
                None
            }
        })
        .collect()
}

fn parse_finished(collection: &str, values: Vec<serde_json::Value>) -> Vec<FinishedExercise> {
    values
        .into_iter()
        .filter_map(|value| match FinishedExercise::from_value(value) {
            Ok(exercise) => Some(exercise),
            Err(e) => {
                tracing::warn!(
                    target: "training",
                    "[TrainingService] Skipping malformed record in '{}': {}",
                    collection,
                    e
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "service_test.rs"]
mod tests;
