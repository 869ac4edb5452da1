use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_AVAILABLE_COLLECTION: &str = "availableExercises";
pub const DEFAULT_FINISHED_COLLECTION: &str = "finishedExercises";
pub const DEFAULT_FETCH_FAILED_MESSAGE: &str = "Fetching Exercises failed, please try later.";

/// Root of `config.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct RootConfig {
    #[serde(default)]
    pub training: TrainingConfig,
}

/// Settings for the training service.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    /// Collection holding the exercise catalog
    pub available_collection: String,
    /// Collection receiving finished exercise records
    pub finished_collection: String,
    /// Message shown when the catalog subscription fails
    pub fetch_failed_message: String,
    /// How long the failure message stays visible
    pub notification_duration_secs: u64,
}

impl TrainingConfig {
    pub fn notification_duration(&self) -> Duration {
        Duration::from_secs(self.notification_duration_secs)
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            available_collection: DEFAULT_AVAILABLE_COLLECTION.to_string(),
            finished_collection: DEFAULT_FINISHED_COLLECTION.to_string(),
            fetch_failed_message: DEFAULT_FETCH_FAILED_MESSAGE.to_string(),
            notification_duration_secs: 3,
        }
    }
}
