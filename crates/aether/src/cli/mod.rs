//! CLI command definitions and handlers.

use std::path::PathBuf;

use aether_common::{AetherError, AetherResult, NetnsPaths};
use aether_network::reconcile::{DEFAULT_HOST_IF, DEFAULT_NAMESPACE, DEFAULT_PEER_IF};
use aether_network::{KernelBackend, Reconciler, Topology};
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::Section;
use color_eyre::eyre::Result;
use miette::Diagnostic;

/// Aether - network namespace and veth pair reconciler
#[derive(Parser, Debug)]
#[command(name = "aether")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Target network namespace
    #[arg(long, global = true, env = "AETHER_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Host-side veth interface
    #[arg(long, global = true, env = "AETHER_HOST_IF", default_value = DEFAULT_HOST_IF)]
    pub host_if: String,

    /// Namespace-side veth interface
    #[arg(long, global = true, env = "AETHER_PEER_IF", default_value = DEFAULT_PEER_IF)]
    pub peer_if: String,

    /// Directory holding named namespace mounts [default: $AETHER_NETNS_DIR or /run/netns]
    #[arg(long, global = true)]
    pub netns_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// The subcommand to execute (default: reconcile).
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Helper commands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Converge the namespace and veth pair (safe to repeat)
    Reconcile,

    /// Check the converged topology without changing anything
    Verify,
}

impl Cli {
    /// Default tracing directive for the chosen verbosity.
    #[must_use]
    pub const fn log_directive(&self) -> &'static str {
        if self.debug { "aether=debug" } else { "aether=info" }
    }

    /// Validated topology from the command-line names.
    ///
    /// # Errors
    ///
    /// Returns an error if a name is invalid or both veth ends share a name.
    pub fn topology(&self) -> AetherResult<Topology> {
        Topology::new(&self.namespace, &self.host_if, &self.peer_if)
    }

    /// Namespace mount directory, falling back to the shared default.
    #[must_use]
    pub fn netns_paths(&self) -> NetnsPaths {
        self.netns_dir
            .as_ref()
            .map_or_else(NetnsPaths::default, NetnsPaths::with_dir)
    }

    /// Execute the CLI command.
    ///
    /// Must run on a single-threaded runtime: namespace membership belongs
    /// to the OS thread.
    ///
    /// # Errors
    ///
    /// Returns the first failure of the selected command.
    pub async fn execute(self) -> Result<()> {
        let topology = self.topology().map_err(into_report)?;
        let paths = self.netns_paths();
        let command = self.command.unwrap_or(Commands::Reconcile);
        tracing::debug!(
            ?command,
            namespace = %topology.namespace,
            veth = %topology.veth,
            netns_dir = %paths.dir.display(),
            "Starting"
        );
        let reconciler = Reconciler::new(KernelBackend::new(paths), topology);

        match command {
            Commands::Reconcile => {
                let report = reconciler.run().await.map_err(into_report)?;
                println!("{report}");
                Ok(())
            }

            Commands::Verify => {
                reconciler.verify().await.map_err(into_report)?;
                let topology = reconciler.topology();
                println!(
                    "Topology converged: {} in {}, {} on host",
                    topology.veth.peer, topology.namespace, topology.veth.host
                );
                Ok(())
            }
        }
    }
}

/// Convert an [`AetherError`] into an eyre report, keeping its help text.
fn into_report(err: AetherError) -> color_eyre::Report {
    let help = err.help().map(|h| h.to_string());
    let report = color_eyre::Report::new(err);
    match help {
        Some(help) => report.suggestion(help),
        None => report,
    }
}
