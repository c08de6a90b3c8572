//! SessionHandle: one named tmux session hosting one long-running process.
//!
//! Cached state is never trusted for liveness: every query goes back to the
//! control plane, and teardown always kills before anything is recreated.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TmuxError;
use crate::executor::TmuxCommandRunner;
use crate::listing::{list_session_panes, list_sessions};
use crate::process::{foreground_child, parse_ps_output};

pub struct SessionHandle {
    name: String,
    runner: Arc<dyn TmuxCommandRunner>,
    session_id: Option<String>,
    kill_grace: Duration,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("name", &self.name)
            .field("host", &self.runner.host())
            .field("session_id", &self.session_id)
            .finish()
    }
}

impl SessionHandle {
    /// A handle is lazy: nothing is created until [`Self::find_or_create`].
    pub fn new(name: impl Into<String>, runner: Arc<dyn TmuxCommandRunner>) -> Self {
        Self {
            name: name.into(),
            runner,
            session_id: None,
            kill_grace: Duration::ZERO,
        }
    }

    /// Delay between interrupting the foreground process and removing the
    /// session, giving senders time to flush.
    #[must_use]
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remote host, `None` when the session is local.
    pub fn host(&self) -> Option<&str> {
        self.runner.host()
    }

    pub fn runner(&self) -> &dyn TmuxCommandRunner {
        self.runner.as_ref()
    }

    /// Last session id seen by this handle (`$N`), if any.
    pub fn cached_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    fn session_target(&self) -> String {
        format!("={}", self.name)
    }

    fn pane_target(&self) -> String {
        format!("={}:", self.name)
    }

    /// Whether a session with this exact name exists right now.
    pub fn exists(&self) -> Result<bool, TmuxError> {
        Ok(list_sessions(self.runner.as_ref())?
            .iter()
            .any(|s| s.name == self.name))
    }

    /// Return the existing session with this name, or create an empty one.
    /// Calling it repeatedly never creates a second session.
    pub fn find_or_create(&mut self) -> Result<&str, TmuxError> {
        let existing = list_sessions(self.runner.as_ref())?
            .into_iter()
            .find(|s| s.name == self.name);
        let id = match existing {
            Some(session) => session.session_id,
            None => {
                tracing::debug!(session = %self.name, host = ?self.host(), "creating session");
                let out = self.runner.run(&[
                    "new-session",
                    "-d",
                    "-s",
                    &self.name,
                    "-P",
                    "-F",
                    "#{session_id}",
                ])?;
                out.trim().to_string()
            }
        };
        Ok(self.session_id.insert(id).as_str())
    }

    /// PID of the process running in the foreground of the session's pane.
    ///
    /// `None` when the session does not exist or its shell is idle.
    pub fn running_pid(&self) -> Result<Option<u32>, TmuxError> {
        let panes = list_session_panes(self.runner.as_ref(), &self.name)?;
        let shell_pids: Vec<u32> = panes.iter().filter_map(|p| p.pane_pid).collect();
        if shell_pids.is_empty() {
            return Ok(None);
        }
        let processes = parse_ps_output(&self.runner.process_table()?);
        Ok(shell_pids
            .into_iter()
            .find_map(|pid| foreground_child(pid, &processes).map(|p| p.pid)))
    }

    /// Whether a foreground process is alive in the session. A missing
    /// session is simply not alive.
    pub fn is_process_alive(&self) -> Result<bool, TmuxError> {
        Ok(self.running_pid()?.is_some())
    }

    /// Type `command_line` into the session followed by Enter. Does not wait
    /// for the command to do anything.
    pub fn send_command(&self, command_line: &str) -> Result<(), TmuxError> {
        let target = self.pane_target();
        tracing::debug!(session = %self.name, "send-keys: {command_line}");
        self.runner
            .run(&["send-keys", "-t", &target, "-l", command_line])?;
        self.runner.run(&["send-keys", "-t", &target, "Enter"])?;
        Ok(())
    }

    /// Interrupt any foreground process, then remove the session.
    ///
    /// A session that does not exist is a no-op; only an unreachable control
    /// plane is an error. The name is free for reuse afterwards.
    pub fn kill(&mut self) -> Result<(), TmuxError> {
        self.session_id = None;
        if !self.exists()? {
            return Ok(());
        }
        tracing::debug!(session = %self.name, host = ?self.host(), "killing session");
        tolerate_missing(self.runner.run(&["send-keys", "-t", &self.pane_target(), "C-c"]))?;
        if !self.kill_grace.is_zero() {
            std::thread::sleep(self.kill_grace);
        }
        tolerate_missing(self.runner.run(&["kill-session", "-t", &self.session_target()]))
    }
}

/// Best-effort calls: only control-plane failures are reported.
fn tolerate_missing(result: Result<String, TmuxError>) -> Result<(), TmuxError> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.is_unavailable() => Err(e),
        Err(e) => {
            tracing::debug!("ignored tmux failure during teardown: {e}");
            Ok(())
        }
    }
}
