use super::Context;
use anyhow::{Context as _, Result};
use fitrack_infrastructure::seed::seed_catalog;

pub async fn run(context: &Context) -> Result<()> {
    let collection = &context.config.training.available_collection;
    let ids = seed_catalog(&context.store, collection)
        .await
        .with_context(|| format!("Failed to seed '{}'", collection))?;

    if ids.is_empty() {
        println!("Catalog '{}' already has exercises, nothing to do.", collection);
    } else {
        println!("Added {} exercises to '{}'.", ids.len(), collection);
    }
    Ok(())
}
