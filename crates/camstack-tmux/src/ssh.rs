//! Remote-login transport: tmux and `ps` tunnelled through ssh.
//!
//! Authentication is assumed pre-provisioned (key based); `BatchMode`
//! makes a missing key fail fast instead of prompting.

use std::process::Command;

use crate::error::TmuxError;
use crate::executor::{PS_ARGS, TmuxCommandRunner, TmuxExecutor, into_stdout};
use crate::quote::join_quoted;

/// ssh reserves exit status 255 for its own failures (unreachable host,
/// refused connection, authentication).
const SSH_FAILURE_CODE: i32 = 255;

/// Runs tmux on a remote host over ssh.
#[derive(Debug, Clone)]
pub struct SshTmuxRunner {
    ssh_bin: String,
    host: String,
    connect_timeout_secs: u32,
    remote: TmuxExecutor,
}

impl SshTmuxRunner {
    /// `host` is anything ssh accepts as a destination (`user@addr`, alias).
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            ssh_bin: "ssh".to_string(),
            host: host.into(),
            connect_timeout_secs: 5,
            remote: TmuxExecutor::default(),
        }
    }

    #[must_use]
    pub fn with_ssh_bin(mut self, bin: impl Into<String>) -> Self {
        self.ssh_bin = bin.into();
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, secs: u32) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn connect_timeout_secs(&self) -> u32 {
        self.connect_timeout_secs
    }

    /// tmux binary / socket selection on the remote side.
    #[must_use]
    pub fn with_remote_tmux(mut self, remote: TmuxExecutor) -> Self {
        self.remote = remote;
        self
    }

    /// Remote shell command line for `tmux <args>`.
    pub(crate) fn remote_tmux_line(&self, args: &[&str]) -> String {
        let words = std::iter::once(self.remote.tmux_bin())
            .chain(self.remote.socket_args())
            .chain(args.iter().copied());
        join_quoted(words)
    }

    /// ssh options and destination, up to the remote command line.
    pub(crate) fn ssh_args(&self) -> Vec<String> {
        vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
            self.host.clone(),
            "--".to_string(),
        ]
    }

    fn ssh(&self, remote_line: &str) -> Result<String, TmuxError> {
        tracing::debug!("ssh {} {remote_line}", self.host);
        let output = Command::new(&self.ssh_bin)
            .args(self.ssh_args())
            .arg(remote_line)
            .output()
            .map_err(|e| TmuxError::Unavailable(format!("{}: {e}", self.ssh_bin)))?;
        match into_stdout(output) {
            Err(TmuxError::CommandFailed { code, stderr }) if code == SSH_FAILURE_CODE => Err(
                TmuxError::Unavailable(format!("ssh {}: {stderr}", self.host)),
            ),
            other => other,
        }
    }
}

impl TmuxCommandRunner for SshTmuxRunner {
    fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        self.ssh(&self.remote_tmux_line(args))
    }

    fn process_table(&self) -> Result<String, TmuxError> {
        self.ssh(&join_quoted(std::iter::once("ps").chain(PS_ARGS)))
    }

    fn host(&self) -> Option<&str> {
        Some(self.host.as_str())
    }
}
