//! Preview server command.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lectern_static::Mode;

use crate::config;

/// Run the serve command.
pub async fn run(config_path: &Path, mode: Mode, port: Option<u16>, dir: Option<PathBuf>) -> Result<()> {
    let config = config::load(config_path, mode)?;
    let dir = dir.unwrap_or_else(|| config.output_path());

    if !dir.exists() {
        anyhow::bail!(
            "Directory not found: {}. Run 'lectern build' first.",
            dir.display()
        );
    }

    let addr: SocketAddr = format!("127.0.0.1:{}", port.unwrap_or(config.port))
        .parse()
        .context("Invalid address")?;

    lectern_server::serve_preview(dir, &config.public_path, addr, true).await?;

    Ok(())
}
