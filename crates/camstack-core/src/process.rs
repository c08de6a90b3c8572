//! Dependent process descriptors and their live session bindings.
//!
//! A [`ProcessDescriptor`] is plain data, built once when a camera is
//! assembled. A [`DependentProcess`] pairs it with the session that runs it
//! (local or remote) and the command line rendered up front, so template
//! errors surface at assembly rather than mid-start.

use std::sync::Arc;
use std::time::Duration;

use camstack_tmux::{SessionHandle, TmuxCommandRunner, shell_quote};
use serde::{Deserialize, Serialize};

use crate::error::CamstackError;
use crate::template::{CliArg, TemplateError, render};

/// CPU set and realtime priority for a process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingTag {
    #[serde(default)]
    pub cset: Option<String>,
    #[serde(default)]
    pub rtprio: Option<u8>,
}

impl SchedulingTag {
    pub fn new(cset: impl Into<String>, rtprio: u8) -> Self {
        Self {
            cset: Some(cset.into()),
            rtprio: Some(rtprio),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cset.is_none() && self.rtprio.is_none()
    }

    /// Wrap a shell command line so it runs in the cpuset with SCHED_FIFO.
    pub fn wrap(&self, command_line: &str) -> String {
        if self.is_empty() {
            return command_line.to_string();
        }
        let mut parts = Vec::new();
        if let Some(cset) = &self.cset {
            parts.push(format!("cset proc -s {} -e --", shell_quote(cset)));
        }
        if let Some(prio) = self.rtprio {
            parts.push(format!("chrt -f {prio}"));
        }
        parts.push(format!("bash -c {}", shell_quote(command_line)));
        parts.join(" ")
    }
}

/// Declarative description of one auxiliary process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDescriptor {
    /// tmux session name; unique per host.
    pub session: String,
    /// Command-line template, see [`crate::template`].
    pub command: String,
    #[serde(default)]
    pub args: Vec<CliArg>,
    /// Host reached over ssh; absent means local.
    #[serde(default)]
    pub remote_host: Option<String>,
    /// Stop this process right before every start of its dependency set.
    #[serde(default)]
    pub kill_upon_create: bool,
    #[serde(default)]
    pub scheduling: Option<SchedulingTag>,
    /// Smaller starts earlier.
    #[serde(default)]
    pub start_order: i32,
    /// Smaller is killed earlier. Left at 0 everywhere, processes stop in
    /// reverse declaration order.
    #[serde(default)]
    pub kill_order: i32,
}

impl ProcessDescriptor {
    /// A process in a local session.
    pub fn local(session: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            command: command.into(),
            args: Vec::new(),
            remote_host: None,
            kill_upon_create: false,
            scheduling: None,
            start_order: 0,
            kill_order: 0,
        }
    }

    /// A process in a session on `host`, driven over ssh.
    pub fn remote(
        session: impl Into<String>,
        command: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            remote_host: Some(host.into()),
            ..Self::local(session, command)
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = CliArg>) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_kill_upon_create(mut self, kill_upon_create: bool) -> Self {
        self.kill_upon_create = kill_upon_create;
        self
    }

    #[must_use]
    pub fn with_scheduling(mut self, tag: SchedulingTag) -> Self {
        self.scheduling = Some(tag);
        self
    }

    #[must_use]
    pub fn with_order(mut self, start_order: i32, kill_order: i32) -> Self {
        self.start_order = start_order;
        self.kill_order = kill_order;
        self
    }

    pub fn is_remote(&self) -> bool {
        self.remote_host.is_some()
    }

    /// The command line sent to the session: template rendered, then
    /// wrapped with the scheduling invocation if any.
    pub fn command_line(&self) -> Result<String, TemplateError> {
        let rendered = render(&self.command, &self.args)?;
        Ok(match &self.scheduling {
            Some(tag) => tag.wrap(&rendered),
            None => rendered,
        })
    }
}

/// A descriptor bound to its session.
#[derive(Debug)]
pub struct DependentProcess {
    descriptor: ProcessDescriptor,
    command_line: String,
    session: SessionHandle,
}

impl DependentProcess {
    /// `runner` must reach the host named by `descriptor.remote_host`.
    pub fn new(
        descriptor: ProcessDescriptor,
        runner: Arc<dyn TmuxCommandRunner>,
    ) -> Result<Self, CamstackError> {
        let command_line = descriptor.command_line()?;
        let session = SessionHandle::new(descriptor.session.clone(), runner);
        Ok(Self {
            descriptor,
            command_line,
            session,
        })
    }

    #[must_use]
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.session = self.session.with_kill_grace(grace);
        self
    }

    pub fn descriptor(&self) -> &ProcessDescriptor {
        &self.descriptor
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// Find or create the session and enter the command line.
    pub fn start(&mut self) -> Result<(), CamstackError> {
        tracing::info!(
            session = %self.descriptor.session,
            host = ?self.descriptor.remote_host,
            "starting dependent"
        );
        self.session.find_or_create()?;
        self.session.send_command(&self.command_line)?;
        Ok(())
    }

    /// Kill the session. Nothing running is not an error.
    pub fn stop(&mut self) -> Result<(), CamstackError> {
        tracing::info!(
            session = %self.descriptor.session,
            host = ?self.descriptor.remote_host,
            "stopping dependent"
        );
        self.session.kill()?;
        Ok(())
    }

    pub fn is_running(&self) -> Result<bool, CamstackError> {
        Ok(self.session.is_process_alive()?)
    }
}
