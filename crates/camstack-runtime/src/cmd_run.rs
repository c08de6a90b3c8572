//! `camstack run`: the controller lives on a blocking worker thread, stdin
//! is read on its own thread, and the async side routes operator lines to
//! the worker while watching for Ctrl-C.

use std::future::Future;
use std::io::{BufRead, Write};

use anyhow::Context;
use camstack_core::{AcquisitionController, CameraDefinition, ModeId};
use tokio::sync::{mpsc, oneshot};

use crate::operator::{OperatorCommand, execute};

struct Request {
    command: OperatorCommand,
    reply: oneshot::Sender<anyhow::Result<String>>,
}

/// Serve requests until `quit` or until the channel closes; the controller
/// is closed either way.
fn worker(mut ctrl: AcquisitionController, mut rx: mpsc::Receiver<Request>) -> anyhow::Result<()> {
    while let Some(req) = rx.blocking_recv() {
        let quit = req.command == OperatorCommand::Quit;
        let result = execute(&mut ctrl, &req.command);
        // The prompt may already be gone on Ctrl-C.
        let _ = req.reply.send(result);
        if quit {
            return Ok(());
        }
    }
    ctrl.close()?;
    Ok(())
}

async fn request(tx: &mpsc::Sender<Request>, command: OperatorCommand) -> anyhow::Result<String> {
    let (reply, rx) = oneshot::channel();
    tx.send(Request { command, reply })
        .await
        .map_err(|_| anyhow::anyhow!("controller worker has exited"))?;
    rx.await.context("controller worker dropped the request")?
}

/// Blocking stdin reads cannot be cancelled, so they run on a detached
/// thread that the process does not wait for on exit.
fn spawn_stdin_reader() -> std::io::Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::Builder::new()
        .name("camstack-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

fn prompt(name: &str) {
    print!("{name}> ");
    let _ = std::io::stdout().flush();
}

/// Route operator lines to the worker until `quit`, end of input or
/// `shutdown`. Returns once the worker has been told to quit.
async fn serve_prompt(
    name: &str,
    mut lines: mpsc::Receiver<String>,
    shutdown: impl Future<Output = ()>,
    tx: &mpsc::Sender<Request>,
) -> anyhow::Result<()> {
    tokio::pin!(shutdown);
    loop {
        prompt(name);
        let line = tokio::select! {
            line = lines.recv() => line,
            () = &mut shutdown => {
                println!();
                None
            }
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<OperatorCommand>() {
            Ok(c) => c,
            Err(msg) => {
                println!("{msg}");
                continue;
            }
        };
        let quit = command == OperatorCommand::Quit;
        match request(tx, command).await {
            Ok(reply) => println!("{reply}"),
            Err(e) => println!("error: {e:#}"),
        }
        if quit {
            return Ok(());
        }
    }

    tracing::info!(camera = %name, "shutting down");
    let reply = request(tx, OperatorCommand::Quit).await?;
    println!("{reply}");
    Ok(())
}

/// Entry point for `camstack run`.
pub async fn cmd_run(def: CameraDefinition, mode: Option<ModeId>) -> anyhow::Result<()> {
    let plane = def.control_plane();
    let ctrl = def
        .build_controller(&plane, Box::new(def.edt_grabber()))
        .context("assembling controller")?;
    let name = def.name().to_string();
    let mode = mode.unwrap_or_else(|| def.initial_mode().clone());

    let (tx, rx) = mpsc::channel(4);
    let handle = tokio::task::spawn_blocking(move || worker(ctrl, rx));

    tracing::info!(camera = %name, %mode, "starting");
    if let Err(e) = request(&tx, OperatorCommand::Mode(mode)).await {
        tracing::error!(camera = %name, "startup failed: {e:#}");
        let _ = request(&tx, OperatorCommand::Quit).await;
        drop(tx);
        handle.await??;
        return Err(e);
    }
    println!("{name}: running, type `quit` or Ctrl-C to stop");

    let lines = spawn_stdin_reader().context("starting stdin reader")?;
    let served = serve_prompt(&name, lines, ctrl_c(), &tx).await;
    drop(tx);
    handle.await??;
    served
}
