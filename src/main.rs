// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "webcam-barcode-scanner")]
#[command(about = "Scan barcodes from a camera or still images")]
#[command(version)]
struct Cli {
    /// Configuration file (JSON); defaults to the user config directory
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Scan from a camera until interrupted
    Scan {
        /// Camera device id (as shown by `list`)
        #[arg(short, long)]
        device: Option<String>,

        /// Only report these symbologies (repeatable)
        #[arg(short, long = "allow")]
        allow: Vec<String>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,

        /// Attach detector payloads to barcode events
        #[arg(long)]
        debug: bool,

        /// Force the pixel-buffer decoder even if a native engine exists
        #[arg(long)]
        fallback: bool,
    },

    /// Decode barcodes in image files
    Image {
        /// Image files to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level, e.g.:
    //   RUST_LOG=webcam_barcode_scanner=debug webcam-barcode-scanner scan
    //   RUST_LOG=webcam_barcode_scanner=info webcam-barcode-scanner scan
    // Default: only warnings and errors
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref())?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        match cli.command {
            Commands::List => cli::list_cameras(&config).await,
            Commands::Scan {
                device,
                allow,
                json,
                debug,
                fallback,
            } => {
                let options = cli::ScanOptions {
                    allow,
                    json,
                    debug,
                    fallback,
                };
                cli::scan(config, device, options).await
            }
            Commands::Image { paths, json } => cli::decode_images(config, paths, json).await,
        }
    })
}
