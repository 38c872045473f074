//! Print the executable unit for a component.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use capsule_transform::SourceUnit;

use crate::config::ConfigFile;

/// Run the transform command.
pub fn run(config: &ConfigFile, file: &Path) -> Result<()> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let unit = config
        .transformer()
        .transform(&SourceUnit::normalize(&raw))
        .with_context(|| format!("Failed to transform {}", file.display()))?;

    println!("{}", unit);
    Ok(())
}
