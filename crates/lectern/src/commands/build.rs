//! Static site build command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lectern_static::{Mode, StaticBuilder};

use crate::config;

/// Run the build command.
pub async fn run(config_path: &Path, mode: Mode, output: Option<PathBuf>) -> Result<()> {
    tracing::info!("Building static site ({} mode)...", mode);

    let mut config = config::load(config_path, mode)?;
    if let Some(output) = output {
        config.output_dir = output;
    }

    let result = StaticBuilder::new(&config)
        .build()
        .context("Build failed")?;

    tracing::info!(
        "Built {} pages from {} modules into {} chunks in {}ms",
        result.pages,
        result.modules,
        result.chunks.len(),
        result.duration_ms
    );

    tracing::info!("Output: {}", result.output_dir.display());

    Ok(())
}
