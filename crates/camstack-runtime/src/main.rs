//! camstack: frame-grabber camera lifecycle coordinator.
//! Loads a camera definition, drives the acquisition controller, and
//! serves an operator prompt while the camera runs.

use anyhow::Context;
use clap::Parser;

mod cli;
mod cmd_modes;
mod cmd_run;
mod cmd_sessions;
mod operator;

fn init_tracing() {
    let filter = std::env::var("CAMSTACK_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: &std::path::Path, tmux_socket: Option<&str>) -> anyhow::Result<camstack_core::CameraDefinition> {
    let mut def = camstack_core::CameraDefinition::load(path)
        .with_context(|| format!("loading {}", path.display()))?;
    if let Some(socket) = tmux_socket {
        def.tmux.socket_name = None;
        def.tmux.socket_path = Some(socket.to_string());
    }
    Ok(def)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    init_tracing();
    let socket = args.tmux_socket.as_deref();

    match args.command {
        cli::Command::Run(opts) => {
            let def = load(&opts.definition, socket)?;
            cmd_run::cmd_run(def, opts.mode).await?;
        }
        cli::Command::Stop(opts) => {
            let def = load(&opts.definition, socket)?;
            cmd_sessions::cmd_stop(&def)?;
        }
        cli::Command::Status(opts) => {
            let def = load(&opts.definition, socket)?;
            cmd_sessions::cmd_status(&def, opts.json)?;
        }
        cli::Command::Modes(opts) => {
            let def = load(&opts.definition, socket)?;
            cmd_modes::cmd_modes(&def)?;
        }
        cli::Command::Check(opts) => {
            let def = load(&opts.definition, socket)?;
            cmd_modes::cmd_check(&def)?;
        }
    }

    Ok(())
}
