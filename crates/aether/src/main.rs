//! Aether CLI entry point.

use aether::cli::{Cli, LogFormat};
use clap::Parser;
use color_eyre::eyre::Result;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// Namespace membership is per OS thread, so everything stays on this one.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for the report
    let json = cli.log_format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_target(true).with_writer(std::io::stderr)))
        .with(EnvFilter::from_default_env().add_directive(cli.log_directive().parse()?))
        .init();

    // Execute command
    cli.execute().await
}
