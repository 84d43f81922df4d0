//! lectern CLI - static build pipeline for a documentation site.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use lectern_static::Mode;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "lectern")]
#[command(about = "Static build pipeline for a documentation site")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to lectern.toml config file
    #[arg(short, long, global = true, default_value = "lectern.toml")]
    config: PathBuf,

    /// Build mode: development, production or production-test
    #[arg(short, long, global = true, env = "LECTERN_MODE", default_value = "development")]
    mode: Mode,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold a site project in the current directory
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },

    /// Build in development mode, serve and rebuild on change
    Dev {
        /// Port to listen on (defaults to config or 5555)
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },

    /// Build the static site
    Build {
        /// Output directory (defaults to config or "dist")
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Preview a built site
    Serve {
        /// Port to listen on (defaults to config or 5555)
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory to serve (defaults to the build output)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Init { yes } => {
            commands::init::run(yes).await?;
        }
        Commands::Dev { port, no_open } => {
            commands::dev::run(&cli.config, port, !no_open).await?;
        }
        Commands::Build { output } => {
            commands::build::run(&cli.config, cli.mode, output).await?;
        }
        Commands::Serve { port, dir } => {
            commands::serve::run(&cli.config, cli.mode, port, dir).await?;
        }
    }

    Ok(())
}
