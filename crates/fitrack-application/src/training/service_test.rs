#[cfg(test)]
mod tests {
    use crate::training::service::{LAST_SELECTED_FIELD, TrainingService};
    use fitrack_core::config::TrainingConfig;
    use fitrack_core::error::{FitrackError, Result};
    use fitrack_core::exercise::{Exercise, ExerciseState};
    use fitrack_core::store::{
        DocumentPath, DocumentSnapshot, DocumentStore, Fields, SnapshotStream, ValueStream,
    };
    use fitrack_core::ui::{Notification, NotificationSink, UiAction, UiDispatcher};
    use futures::StreamExt;
    use futures::channel::mpsc::{UnboundedSender, unbounded};
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::sync::mpsc::error::TryRecvError;

    type CatalogSender = UnboundedSender<Result<Vec<DocumentSnapshot>>>;
    type HistorySender = UnboundedSender<Result<Vec<serde_json::Value>>>;

    // Mock DocumentStore whose subscriptions are fed by the test
    #[derive(Default)]
    struct MockDocumentStore {
        catalog_senders: Mutex<Vec<CatalogSender>>,
        history_senders: Mutex<Vec<HistorySender>>,
        updates: Mutex<Vec<(DocumentPath, Fields)>>,
        added: Mutex<Vec<(String, Fields)>>,
        fail_writes: bool,
        fail_subscribe: bool,
    }

    impl MockDocumentStore {
        fn push_catalog(&self, item: Result<Vec<DocumentSnapshot>>) {
            let senders = self.catalog_senders.lock().unwrap();
            for sender in senders.iter() {
                let _ = sender.unbounded_send(item.clone());
            }
        }

        fn push_history(&self, item: Result<Vec<serde_json::Value>>) {
            let senders = self.history_senders.lock().unwrap();
            for sender in senders.iter() {
                let _ = sender.unbounded_send(item.clone());
            }
        }

        fn open_streams(&self) -> usize {
            let catalog = self.catalog_senders.lock().unwrap();
            let history = self.history_senders.lock().unwrap();
            catalog.iter().filter(|s| !s.is_closed()).count()
                + history.iter().filter(|s| !s.is_closed()).count()
        }

        fn added(&self) -> Vec<(String, Fields)> {
            self.added.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl DocumentStore for MockDocumentStore {
        async fn snapshot_changes(&self, collection: &str) -> Result<SnapshotStream> {
            if self.fail_subscribe {
                return Err(FitrackError::subscription(collection, "permission denied"));
            }
            let (tx, rx) = unbounded();
            self.catalog_senders.lock().unwrap().push(tx);
            Ok(rx.boxed())
        }

        async fn value_changes(&self, _collection: &str) -> Result<ValueStream> {
            let (tx, rx) = unbounded();
            self.history_senders.lock().unwrap().push(tx);
            Ok(rx.boxed())
        }

        async fn update(&self, path: &DocumentPath, fields: Fields) -> Result<()> {
            if self.fail_writes {
                return Err(FitrackError::data_access("offline"));
            }
            self.updates.lock().unwrap().push((path.clone(), fields));
            Ok(())
        }

        async fn add(&self, collection: &str, record: Fields) -> Result<String> {
            if self.fail_writes {
                return Err(FitrackError::data_access("offline"));
            }
            let mut added = self.added.lock().unwrap();
            added.push((collection.to_string(), record));
            Ok(format!("doc-{}", added.len()))
        }
    }

    // Records UI dispatches in order
    #[derive(Default)]
    struct RecordingUi {
        actions: Mutex<Vec<UiAction>>,
    }

    impl UiDispatcher for RecordingUi {
        fn dispatch(&self, action: UiAction) {
            self.actions.lock().unwrap().push(action);
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        shown: Mutex<Vec<Notification>>,
    }

    impl NotificationSink for RecordingSink {
        fn show(&self, notification: Notification) {
            self.shown.lock().unwrap().push(notification);
        }
    }

    struct Fixture {
        store: Arc<MockDocumentStore>,
        ui: Arc<RecordingUi>,
        sink: Arc<RecordingSink>,
        service: TrainingService,
    }

    fn fixture_with(store: MockDocumentStore) -> Fixture {
        let store = Arc::new(store);
        let ui = Arc::new(RecordingUi::default());
        let sink = Arc::new(RecordingSink::default());
        let service = TrainingService::new(
            store.clone(),
            sink.clone(),
            ui.clone(),
            TrainingConfig::default(),
        );
        Fixture {
            store,
            ui,
            sink,
            service,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MockDocumentStore::default())
    }

    fn doc(id: &str, name: &str, duration: f64, calories: f64) -> DocumentSnapshot {
        let value = json!({"name": name, "duration": duration, "calories": calories});
        DocumentSnapshot::new(id, value.as_object().cloned().unwrap())
    }

    async fn recv<T>(rx: &mut UnboundedReceiver<T>) -> T {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for broadcast")
            .expect("channel closed")
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    /// Loads a catalog containing only Crunches (id "1").
    async fn load_crunches(f: &Fixture) {
        let mut rx = f.service.subscribe_exercises_changed();
        f.service.fetch_available_exercises().await;
        f.store
            .push_catalog(Ok(vec![doc("1", "Crunches", 30.0, 8.0)]));
        recv(&mut rx).await;
    }

    #[tokio::test]
    async fn test_start_exercise_returns_copy_of_catalog_entry() {
        let f = fixture();
        load_crunches(&f).await;

        let started = f.service.start_exercise("1").await.unwrap();
        let running = f.service.get_running_exercise().await.unwrap();
        let catalog = f.service.available_exercises().await;

        assert_eq!(started, catalog[0]);
        assert_eq!(running, catalog[0]);
    }

    #[tokio::test]
    async fn test_start_exercise_broadcasts_running_exercise() {
        let f = fixture();
        load_crunches(&f).await;
        let mut rx = f.service.subscribe_exercise_changed();

        f.service.start_exercise("1").await;

        let broadcast = recv(&mut rx).await.unwrap();
        assert_eq!(broadcast.name, "Crunches");
    }

    #[tokio::test]
    async fn test_start_exercise_annotates_last_selected() {
        let f = fixture();
        load_crunches(&f).await;

        f.service.start_exercise("1").await;
        f.service.flush_pending_writes().await;

        let updates = f.store.updates.lock().unwrap().clone();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0.to_string(), "availableExercises/1");
        assert!(updates[0].1.contains_key(LAST_SELECTED_FIELD));
    }

    #[tokio::test]
    async fn test_start_unknown_exercise_is_silent_miss() {
        let f = fixture();
        load_crunches(&f).await;
        let mut rx = f.service.subscribe_exercise_changed();

        assert!(f.service.start_exercise("missing").await.is_none());
        assert!(recv(&mut rx).await.is_none());
        assert!(f.service.get_running_exercise().await.is_none());

        f.service.flush_pending_writes().await;
        assert!(f.store.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_while_running_replaces_session_without_recording() {
        let f = fixture();
        let mut rx = f.service.subscribe_exercises_changed();
        f.service.fetch_available_exercises().await;
        f.store.push_catalog(Ok(vec![
            doc("1", "Crunches", 30.0, 8.0),
            doc("2", "Burpees", 60.0, 8.0),
        ]));
        recv(&mut rx).await;

        f.service.start_exercise("1").await;
        f.service.start_exercise("2").await;
        f.service.flush_pending_writes().await;

        assert_eq!(f.service.get_running_exercise().await.unwrap().id, "2");
        assert!(f.store.added().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_exercise_scales_record() {
        let f = fixture();
        load_crunches(&f).await;
        let mut rx = f.service.subscribe_exercise_changed();

        f.service.start_exercise("1").await;
        let record = f.service.cancel_exercise(50.0).await.unwrap();
        f.service.flush_pending_writes().await;

        assert_eq!(record.duration, 15.0);
        assert_eq!(record.calories, 4.0);
        assert_eq!(record.state, ExerciseState::Cancelled);

        let added = f.store.added();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].0, "finishedExercises");
        assert_eq!(added[0].1.get("duration"), Some(&json!(15.0)));
        assert_eq!(added[0].1.get("calories"), Some(&json!(4.0)));
        assert_eq!(added[0].1.get("state"), Some(&json!("cancelled")));

        assert!(recv(&mut rx).await.is_some());
        assert!(recv(&mut rx).await.is_none());
        assert!(f.service.get_running_exercise().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_exercise_across_progress_values() {
        let f = fixture();
        load_crunches(&f).await;

        for progress in [0.0, 10.0, 25.0, 75.0, 100.0] {
            f.service.start_exercise("1").await;
            let record = f.service.cancel_exercise(progress).await.unwrap();
            assert!((record.duration - 30.0 * progress / 100.0).abs() < 1e-9);
            assert!((record.calories - 8.0 * progress / 100.0).abs() < 1e-9);
            assert!(f.service.get_running_exercise().await.is_none());
        }
    }

    #[tokio::test]
    async fn test_complete_exercise_records_completion() {
        let f = fixture();
        load_crunches(&f).await;

        f.service.start_exercise("1").await;
        let started_at = f.service.running_session().await.unwrap().started_at;
        let record = f.service.complete_exercise().await.unwrap();
        f.service.flush_pending_writes().await;

        assert_eq!(record.state, ExerciseState::Completed);
        assert_eq!(record.duration, 30.0);
        assert!(record.date >= started_at);
        assert_eq!(f.store.added()[0].1.get("state"), Some(&json!("completed")));
    }

    #[tokio::test]
    async fn test_finish_without_running_exercise_is_rejected() {
        let f = fixture();
        load_crunches(&f).await;

        let completed = f.service.complete_exercise().await;
        let cancelled = f.service.cancel_exercise(50.0).await;
        f.service.flush_pending_writes().await;

        assert!(matches!(completed, Err(FitrackError::NoRunningExercise)));
        assert!(matches!(cancelled, Err(FitrackError::NoRunningExercise)));
        assert!(f.store.added().is_empty());
    }

    #[tokio::test]
    async fn test_failed_append_still_ends_session() {
        let f = fixture_with(MockDocumentStore {
            fail_writes: true,
            ..Default::default()
        });
        load_crunches(&f).await;
        let mut rx = f.service.subscribe_exercise_changed();

        f.service.start_exercise("1").await;
        assert!(f.service.complete_exercise().await.is_ok());
        f.service.flush_pending_writes().await;

        assert!(recv(&mut rx).await.is_some());
        assert!(recv(&mut rx).await.is_none());
        assert!(f.service.get_running_exercise().await.is_none());
        assert!(f.sink.shown.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_running_exercise_copies_are_independent() {
        let f = fixture();
        load_crunches(&f).await;
        f.service.start_exercise("1").await;

        let mut first = f.service.get_running_exercise().await.unwrap();
        first.name = "Changed".to_string();
        first.duration = 1.0;
        let second = f.service.get_running_exercise().await.unwrap();

        assert_eq!(second.name, "Crunches");
        assert_eq!(second.duration, 30.0);
    }

    #[tokio::test]
    async fn test_running_exercise_is_detached_from_catalog_updates() {
        let f = fixture();
        load_crunches(&f).await;
        f.service.start_exercise("1").await;

        let mut rx = f.service.subscribe_exercises_changed();
        f.store
            .push_catalog(Ok(vec![doc("1", "Crunches", 90.0, 20.0)]));
        recv(&mut rx).await;

        let running = f.service.get_running_exercise().await.unwrap();
        assert_eq!(running.duration, 30.0);
        assert_eq!(running.calories, 8.0);
    }

    #[tokio::test]
    async fn test_catalog_broadcast_is_latest_snapshot_in_full() {
        let f = fixture();
        let mut rx = f.service.subscribe_exercises_changed();
        f.service.fetch_available_exercises().await;

        f.store.push_catalog(Ok(vec![
            doc("1", "Crunches", 30.0, 8.0),
            doc("2", "Touch Toes", 180.0, 15.0),
        ]));
        f.store
            .push_catalog(Ok(vec![doc("3", "Side Lunges", 120.0, 18.0)]));

        let first = recv(&mut rx).await;
        let second = recv(&mut rx).await;

        assert_eq!(first.len(), 2);
        assert_eq!(
            second,
            vec![Exercise {
                id: "3".to_string(),
                name: "Side Lunges".to_string(),
                duration: 120.0,
                calories: 18.0,
            }]
        );
        assert_eq!(f.service.available_exercises().await, second);
    }

    #[tokio::test]
    async fn test_catalog_skips_malformed_documents() {
        let f = fixture();
        let mut rx = f.service.subscribe_exercises_changed();
        f.service.fetch_available_exercises().await;

        let broken = DocumentSnapshot::new("x", json!({"name": "?"}).as_object().cloned().unwrap());
        f.store
            .push_catalog(Ok(vec![broken, doc("1", "Crunches", 30.0, 8.0)]));

        let catalog = recv(&mut rx).await;
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].id, "1");
    }

    #[tokio::test]
    async fn test_loading_is_bracketed_around_snapshot() {
        let f = fixture();
        load_crunches(&f).await;

        let actions = f.ui.actions.lock().unwrap().clone();
        assert_eq!(actions, vec![UiAction::StartLoading, UiAction::StopLoading]);
    }

    #[tokio::test]
    async fn test_catalog_error_before_snapshot_notifies_once() {
        let f = fixture();
        let mut rx = f.service.subscribe_exercises_changed();
        f.service.fetch_available_exercises().await;

        f.store
            .push_catalog(Err(FitrackError::subscription("availableExercises", "boom")));
        wait_until(|| !f.sink.shown.lock().unwrap().is_empty()).await;

        let shown = f.sink.shown.lock().unwrap().clone();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].message, "Fetching Exercises failed, please try later.");
        assert_eq!(shown[0].action, None);
        assert_eq!(shown[0].duration, Duration::from_secs(3));

        let actions = f.ui.actions.lock().unwrap().clone();
        assert_eq!(actions, vec![UiAction::StartLoading, UiAction::StopLoading]);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_catalog_subscription_survives_error() {
        let f = fixture();
        let mut rx = f.service.subscribe_exercises_changed();
        f.service.fetch_available_exercises().await;

        f.store
            .push_catalog(Err(FitrackError::subscription("availableExercises", "boom")));
        f.store
            .push_catalog(Ok(vec![doc("1", "Crunches", 30.0, 8.0)]));

        assert_eq!(recv(&mut rx).await.len(), 1);
        assert_eq!(f.service.active_subscriptions().await, 1);
    }

    #[tokio::test]
    async fn test_catalog_subscribe_failure_notifies_and_stops_loading() {
        let f = fixture_with(MockDocumentStore {
            fail_subscribe: true,
            ..Default::default()
        });

        f.service.fetch_available_exercises().await;

        assert_eq!(f.sink.shown.lock().unwrap().len(), 1);
        let actions = f.ui.actions.lock().unwrap().clone();
        assert_eq!(actions, vec![UiAction::StartLoading, UiAction::StopLoading]);
        assert_eq!(f.service.active_subscriptions().await, 0);
    }

    #[tokio::test]
    async fn test_history_broadcasts_full_list() {
        let f = fixture();
        let mut rx = f.service.subscribe_finished_exercises_changed();
        f.service.fetch_completed_or_cancelled_exercises().await;

        let record = json!({
            "id": "1",
            "name": "Crunches",
            "duration": 15.0,
            "calories": 4.0,
            "date": "2024-05-01T10:00:00Z",
            "state": "cancelled"
        });
        f.store
            .push_history(Ok(vec![record.clone(), json!({"unexpected": true})]));
        f.store.push_history(Err(FitrackError::data_access("flaky")));
        f.store.push_history(Ok(vec![record.clone(), record]));

        let first = recv(&mut rx).await;
        let second = recv(&mut rx).await;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].state, ExerciseState::Cancelled);
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_subscriptions_is_idempotent() {
        let f = fixture();
        f.service.fetch_available_exercises().await;
        f.service.fetch_completed_or_cancelled_exercises().await;
        assert_eq!(f.service.active_subscriptions().await, 2);

        f.service.cancel_subscriptions().await;
        f.service.cancel_subscriptions().await;

        assert_eq!(f.service.active_subscriptions().await, 0);
        let store = f.store.clone();
        wait_until(move || store.open_streams() == 0).await;
    }

    #[tokio::test]
    async fn test_dropping_service_ends_subscriptions() {
        let f = fixture();
        f.service.fetch_available_exercises().await;
        let store = f.store.clone();

        drop(f);

        wait_until(move || store.open_streams() == 0).await;
    }

    #[tokio::test]
    async fn test_late_listeners_get_no_replay() {
        let f = fixture();
        load_crunches(&f).await;
        f.service.start_exercise("1").await;
        let mut early_history = f.service.subscribe_finished_exercises_changed();
        f.service.fetch_completed_or_cancelled_exercises().await;
        f.store.push_history(Ok(vec![]));
        assert!(recv(&mut early_history).await.is_empty());

        let mut catalog = f.service.subscribe_exercises_changed();
        let mut running = f.service.subscribe_exercise_changed();
        let mut history = f.service.subscribe_finished_exercises_changed();

        assert!(matches!(catalog.try_recv(), Err(TryRecvError::Empty)));
        assert!(matches!(running.try_recv(), Err(TryRecvError::Empty)));
        assert!(matches!(history.try_recv(), Err(TryRecvError::Empty)));

        f.service.complete_exercise().await.unwrap();
        assert!(recv(&mut running).await.is_none());
    }

    #[tokio::test]
    async fn test_slow_listener_receives_every_catalog_snapshot() {
        let f = fixture();
        let mut rx = f.service.subscribe_exercises_changed();
        f.service.fetch_available_exercises().await;

        for n in 0..100 {
            f.store
                .push_catalog(Ok(vec![doc(&n.to_string(), "Crunches", 30.0, 8.0)]));
        }
        wait_until(|| {
            f.ui.actions
                .lock()
                .unwrap()
                .iter()
                .filter(|a| **a == UiAction::StopLoading)
                .count()
                == 100
        })
        .await;

        for n in 0..100 {
            let catalog = recv(&mut rx).await;
            assert_eq!(catalog[0].id, n.to_string());
        }
    }

    #[tokio::test]
    async fn test_slow_listener_receives_every_session_change() {
        let f = fixture();
        load_crunches(&f).await;
        let mut rx = f.service.subscribe_exercise_changed();

        for _ in 0..100 {
            f.service.start_exercise("1").await;
            f.service.cancel_exercise(10.0).await.unwrap();
        }

        for _ in 0..100 {
            assert!(recv(&mut rx).await.is_some());
            assert!(recv(&mut rx).await.is_none());
        }
    }
}
