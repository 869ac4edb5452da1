use super::{Context, format_duration};
use anyhow::{Context as _, Result};
use std::time::Duration;

const HISTORY_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run(context: &Context) -> Result<()> {
    let mut history = context.training.subscribe_finished_exercises_changed();
    context
        .training
        .fetch_completed_or_cancelled_exercises()
        .await;

    let mut finished = tokio::time::timeout(HISTORY_TIMEOUT, history.recv())
        .await
        .context("Timed out waiting for the exercise history")?
        .context("History channel closed")?;

    if finished.is_empty() {
        println!("No finished exercises yet.");
        return Ok(());
    }

    finished.sort_by(|a, b| b.date.cmp(&a.date));

    println!(
        "{:<20} {:<16} {:>8} {:>9} {:<9}",
        "DATE", "NAME", "DURATION", "CALORIES", "STATE"
    );
    for record in &finished {
        println!(
            "{:<20} {:<16} {:>8} {:>9.1} {:<9}",
            record
                .date
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M"),
            record.name,
            format_duration(record.duration),
            record.calories,
            record.state
        );
    }
    Ok(())
}
