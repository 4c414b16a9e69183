//! Sencha CLI - static site builder.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "sencha")]
#[command(about = "Static site builder with plugin hooks")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to sencha.toml config file
    #[arg(short, long, default_value = "sencha.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the site
    Build {
        /// Output directory (defaults to config or "dist")
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Reprocess assets even when their output exists
        #[arg(long)]
        no_cache: bool,
    },

    /// Render one url to stdout without writing it
    Render {
        /// Url of the route, e.g. `/about`
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Build { out, no_cache } => {
            commands::build::run(&cli.config, out, no_cache).await?;
        }
        Commands::Render { url } => {
            commands::render::run(&cli.config, &url).await?;
        }
    }

    Ok(())
}
