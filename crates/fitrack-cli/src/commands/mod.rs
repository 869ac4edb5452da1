use anyhow::{Context as _, Result};
use fitrack_application::TrainingService;
use fitrack_core::config::RootConfig;
use fitrack_core::exercise::Exercise;
use fitrack_infrastructure::{ConfigService, FitrackPaths, InMemoryDocumentStore, UiService};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub mod config;
pub mod exercises;
pub mod history;
pub mod seed;
pub mod train;

/// How long to wait for the first snapshot of a collection.
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a command needs, wired once per invocation.
pub struct Context {
    pub config: RootConfig,
    pub config_path: PathBuf,
    pub store: Arc<InMemoryDocumentStore>,
    pub ui: Arc<UiService>,
    pub training: TrainingService,
}

impl Context {
    pub fn open(config_path: Option<PathBuf>, store_path: Option<PathBuf>) -> Result<Self> {
        let config_service = match config_path {
            Some(path) => ConfigService::new(path),
            None => ConfigService::from_default_location()
                .context("Failed to locate the config directory")?,
        };
        let config = config_service.get_config();

        let store_path = match store_path {
            Some(path) => path,
            None => FitrackPaths::store_file().context("Failed to locate the data directory")?,
        };
        let store = Arc::new(
            InMemoryDocumentStore::open(store_path.clone())
                .with_context(|| format!("Failed to open store at {}", store_path.display()))?,
        );

        tracing::debug!(
            "[cli] config: {:?}, store: {:?}",
            config_service.path(),
            store_path
        );

        let ui = Arc::new(UiService::new());
        let training = TrainingService::new(
            store.clone(),
            ui.clone(),
            ui.clone(),
            config.training.clone(),
        );

        Ok(Self {
            config,
            config_path: config_service.path().to_path_buf(),
            store,
            ui,
            training,
        })
    }

    /// Subscribes to the catalog and waits for its first snapshot.
    pub async fn load_catalog(&self) -> Result<Vec<Exercise>> {
        let mut catalog = self.training.subscribe_exercises_changed();
        let mut notifications = self.ui.subscribe_notifications();
        self.training.fetch_available_exercises().await;

        tokio::select! {
            exercises = catalog.recv() => exercises.context("Catalog channel closed"),
            notification = notifications.recv() => {
                let notification = notification.context("Notification channel closed")?;
                anyhow::bail!("{}", notification.message)
            }
            _ = tokio::time::sleep(SNAPSHOT_TIMEOUT) => {
                anyhow::bail!("Timed out waiting for the exercise catalog")
            }
        }
    }

    /// Runs a command, then shuts down whether or not it succeeded.
    ///
    /// Writes issued before a failure still reach the store.
    pub async fn run(&self, command: impl Future<Output = Result<()>>) -> Result<()> {
        let result = command.await;
        self.shutdown().await;
        result
    }

    /// Ends subscriptions and waits for outstanding writes.
    pub async fn shutdown(&self) {
        self.training.cancel_subscriptions().await;
        self.training.flush_pending_writes().await;
    }
}

/// Formats seconds as `m:ss`.
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
