// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "burst-capture")]
#[command(about = "Burst capture admission control for the camera")]
#[command(version)]
struct Cli {
    /// JSON configuration file (missing fields use defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a burst against a synthetic camera
    Simulate {
        /// Number of capture requests to submit
        #[arg(short, long, default_value = "10")]
        requests: usize,

        /// Simulated shutter time per capture in milliseconds
        #[arg(long, default_value = "400")]
        capture_ms: u64,

        /// Delay between taps in milliseconds (0 = back-to-back)
        #[arg(long, default_value = "0")]
        tap_interval_ms: u64,

        /// Frame buffer size in bytes
        #[arg(long, default_value = "2097152")]
        frame_bytes: usize,

        /// Make every Nth capture fail
        #[arg(long)]
        fail_every: Option<usize>,

        /// Simulate a device under memory pressure
        #[arg(long)]
        pressure: bool,
    },

    /// Print the effective configuration as JSON
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=burst_capture=trace, RUST_LOG=info
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
        Commands::Simulate {
            requests,
            capture_ms,
            tap_interval_ms,
            frame_bytes,
            fail_every,
            pressure,
        } => cli::simulate(
            config,
            cli::SimulateOptions {
                requests,
                capture_ms,
                tap_interval_ms,
                frame_bytes,
                fail_every,
                pressure,
            },
        ),
        Commands::Config => cli::print_config(&config),
    }
}
