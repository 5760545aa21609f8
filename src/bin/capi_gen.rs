//! capi-gen CLI
//!
//! Commands: generate, check, summary
//! Diagnostics go to stderr, the JSON summary to stdout.
//! Returns 1 on I/O or configuration failure, 2 on audit failure or stale headers.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use capi_codegen::{logging, GenerationError, Generator, GeneratorConfig, GENERATOR_VERSION};

#[derive(Parser)]
#[command(name = "capi-gen")]
#[command(about = "Generates the versioned extension C API struct and headers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); defaults apply when it does not exist
    #[arg(short, long, default_value = "capi-gen.toml")]
    config: PathBuf,

    /// Root that relative input and output paths resolve against
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and write all headers
    Generate,

    /// Verify the headers on disk are up to date without writing
    Check,

    /// Print the generation summary as JSON without writing
    Summary,
}

fn load_generator(cli: &Cli) -> anyhow::Result<Generator> {
    let config = GeneratorConfig::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?
        .rooted_at(&cli.root);
    Ok(Generator::new(config))
}

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<GenerationError>() {
        Some(e) if e.is_audit_failure() => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let generator = load_generator(cli)?;
    let generation = generator.generate()?;

    match cli.command {
        Commands::Generate => {
            generator.write(&generation)?;
            info!("C API headers generated successfully");
        }
        Commands::Check => {
            let stale = generator.stale_artifacts(&generation)?;
            if !stale.is_empty() {
                for artifact in &stale {
                    error!(path = %artifact.path.display(), "out of date");
                }
                return Ok(ExitCode::from(2));
            }
            info!("C API headers are up to date");
        }
        Commands::Summary => {}
    }

    let output = serde_json::json!({
        "generator_version": GENERATOR_VERSION,
        "summary": generation.summary,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.log_level) {
        eprintln!("{}", e);
    }

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            exit_code_for(&e)
        }
    }
}
