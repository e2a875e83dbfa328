// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "card-scanner")]
#[command(about = "Trading card scanner")]
#[command(version = card_scanner::constants::APP_VERSION)]
struct Cli {
    /// Configuration file (default: <config dir>/card-scanner/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize the card in a still image
    Recognize {
        /// Image file
        image: PathBuf,

        /// Submit the whole image instead of the manual capture region
        #[arg(long)]
        full: bool,

        /// Add the result to a scan log (JSON)
        #[arg(short, long)]
        log: Option<PathBuf>,
    },

    /// Print the focus score of an image
    Focus {
        /// Image file
        image: PathBuf,

        /// Score only the manual capture region
        #[arg(long)]
        region: bool,
    },

    /// Run the full pipeline over a directory of frames
    Scan {
        /// Directory of frame images, played back in file name order
        dir: PathBuf,

        /// Recorded detector output to replay (JSON array of keypoint sets)
        #[arg(short, long)]
        detections: PathBuf,

        /// Upload into a remote session (join URL or session id) instead of recognizing
        #[arg(short, long)]
        remote: Option<String>,

        /// Play the frames back repeatedly until Ctrl+C
        #[arg(long = "loop")]
        looping: bool,

        /// Add recognized cards to a scan log (JSON)
        #[arg(short, long)]
        log: Option<PathBuf>,
    },

    /// Start a remote session and print results until Ctrl+C
    Session {
        /// Add received cards to a scan log (JSON)
        #[arg(short, long)]
        log: Option<PathBuf>,
    },

    /// Decode a join code from an image
    Join {
        /// Image showing the QR code
        image: PathBuf,
    },

    /// Print the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=card_scanner=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Recognize { image, full, log } => {
            cli::recognize_image(&config, &image, full, log.as_deref())
        }
        Commands::Focus { image, region } => cli::focus_report(&config, &image, region),
        Commands::Scan {
            dir,
            detections,
            remote,
            looping,
            log,
        } => cli::scan_directory(
            &config,
            &dir,
            &detections,
            remote.as_deref(),
            looping,
            log.as_deref(),
        ),
        Commands::Session { log } => cli::run_session(&config, log.as_deref()),
        Commands::Join { image } => cli::decode_join(&image),
        Commands::Config { save } => cli::show_config(&config, cli.config.as_deref(), save),
    }
}
