use super::Context;
use anyhow::{Context as _, Result};

pub fn run(context: &Context) -> Result<()> {
    let rendered =
        toml::to_string_pretty(&context.config).context("Failed to render configuration")?;
    println!("# {}", context.config_path.display());
    print!("{}", rendered);
    Ok(())
}
