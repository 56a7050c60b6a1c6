//! mocap-export - motion-capture export tool
//!
//! Converts raw joint-position captures (.json) into rotation animations
//! (.anim.json) and inspects converted files.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mocap_core::SolverConfig;
use std::path::PathBuf;

use mocap_export::{SkeletonSource, convert_file, default_output, inspect_file};

#[derive(Parser)]
#[command(name = "mocap-export")]
#[command(about = "Motion-capture export tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert raw joint positions into a rotation animation
    Convert {
        /// Input raw position file (.json)
        input: PathBuf,

        /// Output .anim.json file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Solver config (.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Skeleton: "hdm05" or a .toml/.json skeleton file (default: from input)
        #[arg(short, long)]
        skeleton: Option<SkeletonSource>,
    },

    /// Print a summary of a converted animation
    Inspect {
        /// Input .anim.json file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            input,
            output,
            config,
            skeleton,
        } => {
            let output = output.unwrap_or_else(|| default_output(&input));
            let config = match config {
                Some(path) => SolverConfig::load(&path)
                    .with_context(|| format!("Failed to load solver config: {:?}", path))?,
                None => SolverConfig::default(),
            };
            let skeleton = skeleton.unwrap_or(SkeletonSource::Document);

            tracing::info!("Converting {:?} -> {:?}", input, output);
            convert_file(&input, &output, &skeleton, &config)?;
            tracing::info!("Done!");
        }

        Commands::Inspect { input } => {
            inspect_file(&input)?;
        }
    }

    Ok(())
}
