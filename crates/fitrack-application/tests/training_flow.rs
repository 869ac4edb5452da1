//! End-to-end training flow against the file-backed store.

use fitrack_application::{LAST_SELECTED_FIELD, TrainingService};
use fitrack_core::config::TrainingConfig;
use fitrack_core::exercise::{ExerciseState, FinishedExercise};
use fitrack_core::store::{DocumentStore, Fields};
use fitrack_infrastructure::seed::{DEFAULT_CATALOG, seed_catalog};
use fitrack_infrastructure::{InMemoryDocumentStore, UiService};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

async fn recv<T>(rx: &mut UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for broadcast")
        .expect("channel closed")
}

fn service(store: Arc<InMemoryDocumentStore>, ui: Arc<UiService>) -> TrainingService {
    TrainingService::new(store, ui.clone(), ui, TrainingConfig::default())
}

#[tokio::test]
async fn test_session_is_recorded_and_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store.json");
    let config = TrainingConfig::default();

    let store = Arc::new(InMemoryDocumentStore::open(path.clone()).unwrap());
    seed_catalog(&store, &config.available_collection)
        .await
        .unwrap();
    let ui = Arc::new(UiService::new());
    let training = service(store.clone(), ui.clone());

    let mut catalog = training.subscribe_exercises_changed();
    training.fetch_available_exercises().await;
    let exercises = recv(&mut catalog).await;
    assert_eq!(exercises.len(), DEFAULT_CATALOG.len());
    assert!(!ui.is_loading());

    let burpees = exercises.iter().find(|e| e.name == "Burpees").unwrap();
    let started = training.start_exercise(&burpees.id).await.unwrap();
    assert_eq!(started.id, burpees.id);

    let finished = training.cancel_exercise(50.0).await.unwrap();
    assert_eq!(finished.state, ExerciseState::Cancelled);
    assert_eq!(finished.duration, 30.0);
    assert_eq!(finished.calories, 4.0);
    assert!(training.get_running_exercise().await.is_none());

    training.flush_pending_writes().await;
    training.cancel_subscriptions().await;
    drop(training);

    let reopened = Arc::new(InMemoryDocumentStore::open(path).unwrap());
    let catalog_docs = reopened.documents(&config.available_collection).unwrap();
    let annotated = catalog_docs.iter().find(|d| d.id == burpees.id).unwrap();
    assert!(annotated.data.contains_key(LAST_SELECTED_FIELD));

    let training = service(reopened, Arc::new(UiService::new()));
    let mut history = training.subscribe_finished_exercises_changed();
    training.fetch_completed_or_cancelled_exercises().await;
    let records: Vec<FinishedExercise> = recv(&mut history).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "Burpees");
    assert_eq!(records[0].state, ExerciseState::Cancelled);
}

#[tokio::test]
async fn test_subscription_failure_reaches_ui() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let ui = Arc::new(UiService::new());
    let training = service(store.clone(), ui.clone());
    let config = TrainingConfig::default();

    let mut catalog = training.subscribe_exercises_changed();
    let mut notifications = ui.subscribe_notifications();
    training.fetch_available_exercises().await;
    assert!(recv(&mut catalog).await.is_empty());

    store
        .emit_error(
            &config.available_collection,
            fitrack_core::FitrackError::subscription(&config.available_collection, "offline"),
        )
        .unwrap();

    let notification = tokio::time::timeout(Duration::from_secs(2), notifications.recv())
        .await
        .expect("timed out waiting for notification")
        .expect("notification channel closed");
    assert_eq!(notification.message, config.fetch_failed_message);
    assert_eq!(notification.duration, Duration::from_secs(3));
    assert!(!ui.is_loading());
}

#[tokio::test]
async fn test_cancel_subscriptions_releases_store_watchers() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let training = service(store.clone(), Arc::new(UiService::new()));
    let config = TrainingConfig::default();

    let mut catalog = training.subscribe_exercises_changed();
    training.fetch_available_exercises().await;
    training.fetch_completed_or_cancelled_exercises().await;
    recv(&mut catalog).await;
    assert_eq!(training.active_subscriptions().await, 2);

    training.cancel_subscriptions().await;
    assert_eq!(training.active_subscriptions().await, 0);

    for _ in 0..50 {
        if store.subscriber_count(&config.available_collection) == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(store.subscriber_count(&config.available_collection), 0);
}

#[tokio::test]
async fn test_catalog_listener_that_reads_late_sees_every_write() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let training = service(store.clone(), Arc::new(UiService::new()));
    let config = TrainingConfig::default();

    let mut catalog = training.subscribe_exercises_changed();
    training.fetch_available_exercises().await;

    for n in 0..70 {
        let mut fields = Fields::new();
        fields.insert("name".to_string(), json!(format!("Drill {}", n)));
        fields.insert("duration".to_string(), json!(60.0));
        fields.insert("calories".to_string(), json!(5.0));
        store
            .add(&config.available_collection, fields)
            .await
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Initial empty snapshot, then one snapshot per write
    for expected in 0..=70 {
        assert_eq!(recv(&mut catalog).await.len(), expected);
    }
}
