use super::{Context, format_duration};
use anyhow::{Context as _, Result, bail};
use fitrack_core::exercise::FinishedExercise;
use std::io::Write;
use std::time::Duration;

/// Shortest tick, so zero-length exercises still finish.
const MIN_STEP: Duration = Duration::from_millis(1);

/// Time between two one-percent progress steps.
fn step_interval(duration_secs: f64, speed: f64) -> Duration {
    let secs = duration_secs / 100.0 / speed;
    if !secs.is_finite() || secs <= 0.0 {
        return MIN_STEP;
    }
    Duration::from_secs_f64(secs).max(MIN_STEP)
}

#[derive(Debug, PartialEq)]
enum Outcome {
    Completed,
    Cancelled(f64),
}

/// Advances progress one percent per `step` until 100 %, the `cancel_at`
/// limit, or `interrupt` resolving.
///
/// The limit is checked before the first step, so `cancel_at == 0` cancels
/// with no progress.
async fn tick_session(
    step: Duration,
    cancel_at: Option<f64>,
    interrupt: impl Future<Output = ()>,
) -> Outcome {
    let limit_reached = |progress: f64| cancel_at.is_some_and(|limit| progress >= limit);
    if limit_reached(0.0) {
        return Outcome::Cancelled(0.0);
    }

    let mut ticker = tokio::time::interval(step);
    ticker.tick().await;
    let mut progress = 0.0_f64;
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            _ = &mut interrupt => {
                println!();
                return Outcome::Cancelled(progress);
            }
            _ = ticker.tick() => {
                progress += 1.0;
                print!("\r{:>3.0}%", progress);
                let _ = std::io::stdout().flush();

                if progress >= 100.0 {
                    println!();
                    return Outcome::Completed;
                }
                if limit_reached(progress) {
                    println!();
                    return Outcome::Cancelled(progress);
                }
            }
        }
    }
}

pub async fn run(context: &Context, id: &str, cancel_at: Option<f64>, speed: f64) -> Result<()> {
    if !(speed.is_finite() && speed > 0.0) {
        bail!("--speed must be a positive number, got {}", speed);
    }
    if let Some(percent) = cancel_at {
        if !(0.0..=100.0).contains(&percent) {
            bail!("--cancel-at must be between 0 and 100, got {}", percent);
        }
    }

    context.load_catalog().await?;
    let exercise = match context.training.start_exercise(id).await {
        Some(exercise) => exercise,
        None => bail!("No exercise with id '{}'. See `fitrack exercises`.", id),
    };

    println!(
        "Starting {} ({}, {:.1} kcal)",
        exercise.name,
        format_duration(exercise.duration),
        exercise.calories
    );

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("[cli] Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let step = step_interval(exercise.duration, speed);
    let outcome = tick_session(step, cancel_at, interrupt).await;

    let finished = match outcome {
        Outcome::Completed => context.training.complete_exercise().await,
        Outcome::Cancelled(progress) => context.training.cancel_exercise(progress).await,
    }
    .context("Failed to finish the session")?;

    report(&finished);
    Ok(())
}

fn report(finished: &FinishedExercise) {
    println!(
        "{} {}: {} and {:.1} kcal recorded",
        finished.name,
        finished.state,
        format_duration(finished.duration),
        finished.calories
    );
}
