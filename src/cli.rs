// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pullwarden")]
#[command(about = "Resilient registry access for large-batch container image verification")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print final results
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a pullwarden.yml listing every default
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Classify registry tool stderr
    Classify {
        /// The stderr text to classify
        stderr: String,
    },

    /// Check whether a vendor image exists
    Verify {
        image: String,

        /// Skip the metadata API tier
        #[arg(long)]
        no_metadata_api: bool,
    },

    /// Pull an image, falling back to alternatives on failure
    Pull {
        image: String,

        /// Known upstream equivalent to try on failure
        #[arg(long)]
        upstream: Option<String>,

        /// Allow the vendor's private namespace on auth failures
        #[arg(long)]
        allow_private_fallback: bool,

        /// Target platform
        #[arg(long)]
        platform: Option<String>,
    },

    /// Pull every image in a list, recording outcomes in a checkpoint
    Scan {
        /// File with one image reference per line
        #[arg(long)]
        images: PathBuf,

        /// Checkpoint file (defaults to the configured path)
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Continue images without a recorded outcome
        #[arg(long)]
        resume: bool,

        /// Re-attempt recoverable failures from the checkpoint
        #[arg(long)]
        retry_failures: bool,

        /// With --retry-failures, skip failures that look permanent
        #[arg(long)]
        skip_permanent_failures: bool,

        /// Concurrent pulls
        #[arg(long, default_value_t = 4)]
        concurrency: usize,

        /// Allow the vendor's private namespace on auth failures
        #[arg(long)]
        allow_private_fallback: bool,
    },

    /// Monthly vulnerability growth ratios for one or more tags of a repository
    Growth {
        repo: String,

        #[arg(required = true)]
        tags: Vec<String>,
    },
}
