// ABOUTME: Entry point for the pullwarden CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::ScanArgs;
use pullwarden::config::{self, Config};
use pullwarden::error::Result;
use pullwarden::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins, then the verbose flag
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut output = Output::new(OutputMode::from_flags(cli.quiet, cli.json));

    match run(cli, &mut output).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            output.error(&e.to_string());
            std::process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when the command ran but its work did not succeed.
async fn run(cli: Cli, output: &mut Output) -> Result<bool> {
    let cwd = env::current_dir()?;

    match cli.command {
        Commands::Init { force } => {
            let path = config::init_config(&cwd, force)?;
            output.success(&format!("Wrote {}", path.display()));
            Ok(true)
        }
        Commands::Classify { stderr } => {
            commands::classify(&stderr, output);
            Ok(true)
        }
        Commands::Verify {
            image,
            no_metadata_api,
        } => {
            let config = Config::discover(&cwd)?;
            commands::verify(config, &image, no_metadata_api, output).await?;
            Ok(true)
        }
        Commands::Pull {
            image,
            upstream,
            allow_private_fallback,
            platform,
        } => {
            let config = Config::discover(&cwd)?;
            commands::pull(
                config,
                &image,
                upstream.as_deref(),
                allow_private_fallback,
                platform,
                output,
            )
            .await
        }
        Commands::Scan {
            images,
            checkpoint,
            resume,
            retry_failures,
            skip_permanent_failures,
            concurrency,
            allow_private_fallback,
        } => {
            let config = Config::discover(&cwd)?;
            let args = ScanArgs {
                images,
                checkpoint,
                resume,
                retry_failures,
                skip_permanent_failures,
                concurrency,
                allow_private_fallback,
            };
            commands::scan(config, args, output).await
        }
        Commands::Growth { repo, tags } => {
            let config = Config::discover(&cwd)?;
            commands::growth(config, &repo, &tags, output).await?;
            Ok(true)
        }
    }
}
