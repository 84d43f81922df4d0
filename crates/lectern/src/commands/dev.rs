//! Development server command.

use std::path::Path;

use anyhow::Result;
use lectern_server::{DevServer, DevServerConfig};
use lectern_static::Mode;

use crate::config;

/// Run the dev server. Always builds in development mode.
pub async fn run(config_path: &Path, port: Option<u16>, open: bool) -> Result<()> {
    let mut build = config::load(config_path, Mode::Development)?;
    if let Some(port) = port {
        build.port = port;
    }

    tracing::info!("Starting development server on port {}", build.port);

    let mut config = DevServerConfig::new(build);
    config.open = open;

    DevServer::new(config).start().await?;

    Ok(())
}
