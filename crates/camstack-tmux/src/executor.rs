//! TmuxCommandRunner trait and TmuxExecutor (sync subprocess wrapper).
//! The trait is the single seam between session logic and the host, so
//! local, remote and in-memory control planes are interchangeable.

use std::process::{Command, Output};

use crate::error::TmuxError;

/// Executes tmux commands and process-table queries on one host.
pub trait TmuxCommandRunner: Send + Sync {
    /// Run `tmux <args>` and return its stdout.
    fn run(&self, args: &[&str]) -> Result<String, TmuxError>;

    /// Raw `ps -eo pid=,ppid=,args=` output from the same host.
    fn process_table(&self) -> Result<String, TmuxError>;

    /// Remote host this runner reaches, `None` for the local machine.
    fn host(&self) -> Option<&str> {
        None
    }
}

impl<T: TmuxCommandRunner + ?Sized> TmuxCommandRunner for &T {
    fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        (**self).run(args)
    }

    fn process_table(&self) -> Result<String, TmuxError> {
        (**self).process_table()
    }

    fn host(&self) -> Option<&str> {
        (**self).host()
    }
}

/// Arguments for `ps` that produce the table parsed by [`crate::parse_ps_output`].
pub const PS_ARGS: [&str; 2] = ["-eo", "pid=,ppid=,args="];

/// Real local tmux executor using `std::process::Command`.
#[derive(Debug, Clone)]
pub struct TmuxExecutor {
    tmux_bin: String,
    socket_path: Option<String>,
    socket_name: Option<String>,
}

impl TmuxExecutor {
    pub fn new(tmux_bin: impl Into<String>) -> Self {
        Self {
            tmux_bin: tmux_bin.into(),
            socket_path: None,
            socket_name: None,
        }
    }

    #[must_use]
    pub fn with_socket_path(mut self, path: impl Into<String>) -> Self {
        self.socket_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_socket_name(mut self, name: impl Into<String>) -> Self {
        self.socket_name = Some(name.into());
        self
    }

    /// Leading tmux arguments selecting the server socket.
    pub(crate) fn socket_args(&self) -> Vec<&str> {
        // Socket path takes precedence over socket name
        if let Some(ref path) = self.socket_path {
            vec!["-S", path.as_str()]
        } else if let Some(ref name) = self.socket_name {
            vec!["-L", name.as_str()]
        } else {
            Vec::new()
        }
    }

    pub(crate) fn tmux_bin(&self) -> &str {
        &self.tmux_bin
    }
}

impl Default for TmuxExecutor {
    fn default() -> Self {
        Self::new("tmux")
    }
}

/// Turn a finished process into stdout or a `CommandFailed` error.
pub(crate) fn into_stdout(output: Output) -> Result<String, TmuxError> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TmuxError::CommandFailed {
            code: output.status.code().unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

impl TmuxCommandRunner for TmuxExecutor {
    fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        let mut cmd = Command::new(&self.tmux_bin);
        cmd.args(self.socket_args());
        cmd.args(args);
        tracing::debug!("tmux {}", args.join(" "));
        let output = cmd.output().map_err(TmuxError::Io)?;
        into_stdout(output)
    }

    fn process_table(&self) -> Result<String, TmuxError> {
        let output = Command::new("ps").args(PS_ARGS).output()?;
        into_stdout(output)
    }
}
