use super::{Context, format_duration};
use anyhow::Result;

pub async fn run(context: &Context) -> Result<()> {
    let exercises = context.load_catalog().await?;

    if exercises.is_empty() {
        println!("No exercises available. Run `fitrack seed` to add the demo catalog.");
        return Ok(());
    }

    println!("{:<24} {:<16} {:>8} {:>9}", "ID", "NAME", "DURATION", "CALORIES");
    for exercise in &exercises {
        println!(
            "{:<24} {:<16} {:>8} {:>9.1}",
            exercise.id,
            exercise.name,
            format_duration(exercise.duration),
            exercise.calories
        );
    }
    Ok(())
}
