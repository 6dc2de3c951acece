//! CLI commands.

mod decode;
mod handlers;
mod patch;
mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

/// fleetctl - Render per-replica cloud-init user-data for a fleet.
#[derive(Debug, Parser)]
#[command(name = "fleetctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve a fleet's substitutions and print each replica's user-data.
    Render(render::RenderCommand),

    /// Set keys in base64 user-data and print the re-encoded document.
    Patch(patch::PatchCommand),

    /// Decode base64 user-data and print the cloud-config document.
    Decode(decode::DecodeCommand),

    /// List the supported substitution types.
    Handlers,
}

impl Cli {
    /// Run the CLI command.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Render(cmd) => cmd.run(self.format),
            Commands::Patch(cmd) => cmd.run(self.format),
            Commands::Decode(cmd) => cmd.run(),
            Commands::Handlers => handlers::run(self.format),
        }
    }
}
