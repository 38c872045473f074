//! Capsule CLI - live preview for generated React components.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

use config::ConfigFile;

#[derive(Parser)]
#[command(name = "capsule")]
#[command(about = "Live preview for generated React components")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to capsule.toml config file
    #[arg(short, long, default_value = "capsule.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create capsule.toml and a starter component
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },

    /// Start the live preview server
    Dev {
        /// Component source file (defaults to config or "page.tsx")
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Port to listen on (defaults to config or 7878)
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,

        /// Write source posted to the server back to the source file
        #[arg(long)]
        write_back: bool,
    },

    /// Render a component once and print its markup
    Render {
        /// Component source file
        file: PathBuf,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the executable script for a component
    Transform {
        /// Component source file
        file: PathBuf,
    },

    /// Package a component as a standalone Vite project
    Export {
        /// Component source file
        file: PathBuf,

        /// Archive to write
        #[arg(short, long, default_value = "capsule-project.zip")]
        out: PathBuf,
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

    // Execute command
    match cli.command {
        Commands::Init { yes } => {
            commands::init::run(yes).await?;
        }
        Commands::Dev {
            source,
            port,
            no_open,
            write_back,
        } => {
            let config = ConfigFile::load(&cli.config)?;
            let options = commands::dev::DevOptions {
                source,
                port,
                open: !no_open,
                write_back,
            };
            commands::dev::run(config, options).await?;
        }
        Commands::Render { file, json } => {
            let config = ConfigFile::load(&cli.config)?;
            if !commands::render::run(&config, &file, json)? {
                std::process::exit(1);
            }
        }
        Commands::Transform { file } => {
            let config = ConfigFile::load(&cli.config)?;
            commands::transform::run(&config, &file)?;
        }
        Commands::Export { file, out } => {
            commands::export::run(&file, &out)?;
        }
    }

    Ok(())
}
