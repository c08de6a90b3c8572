//! CLI definition using clap derive.

use std::path::PathBuf;

use camstack_core::ModeId;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "camstack", about = "frame-grabber camera lifecycle coordinator")]
pub struct Cli {
    /// tmux server socket path, overriding the camera definition
    #[arg(long, global = true, env = "CAMSTACK_TMUX_SOCKET")]
    pub tmux_socket: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Configure and start a camera, then serve the operator prompt
    Run(RunOpts),
    /// Kill a camera's acquisition and dependent sessions
    Stop(DefinitionArg),
    /// Report which of a camera's sessions are alive
    Status(StatusOpts),
    /// List the camera's mode table
    Modes(DefinitionArg),
    /// Validate a camera definition and print what would run
    Check(DefinitionArg),
}

#[derive(clap::Args)]
pub struct DefinitionArg {
    /// Camera definition (TOML)
    pub definition: PathBuf,
}

#[derive(clap::Args)]
pub struct RunOpts {
    /// Camera definition (TOML)
    pub definition: PathBuf,

    /// Start mode, instead of the one in the definition
    #[arg(long, short = 'm')]
    pub mode: Option<ModeId>,
}

#[derive(clap::Args)]
pub struct StatusOpts {
    /// Camera definition (TOML)
    pub definition: PathBuf,

    /// Print the audit as JSON
    #[arg(long)]
    pub json: bool,
}
