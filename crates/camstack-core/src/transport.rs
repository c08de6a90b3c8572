//! Choice of control plane per process placement: the local tmux server,
//! or a remote one reached over ssh.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use camstack_tmux::{SshTmuxRunner, TmuxCommandRunner, TmuxExecutor};

/// Hands out tmux runners for the local host and for remote hosts.
pub trait ControlPlane: Send + Sync {
    fn local(&self) -> Arc<dyn TmuxCommandRunner>;

    fn remote(&self, host: &str) -> Arc<dyn TmuxCommandRunner>;

    /// Runner for a process placed on `host` (`None` = local).
    fn runner_for(&self, host: Option<&str>) -> Arc<dyn TmuxCommandRunner> {
        match host {
            Some(h) => self.remote(h),
            None => self.local(),
        }
    }
}

/// Production control plane: `tmux` locally, `ssh <host> tmux` remotely.
/// One ssh runner is kept per host.
pub struct TmuxControlPlane {
    local: Arc<TmuxExecutor>,
    ssh_bin: String,
    connect_timeout_secs: u32,
    remote_tmux: TmuxExecutor,
    remotes: Mutex<HashMap<String, Arc<SshTmuxRunner>>>,
}

impl TmuxControlPlane {
    pub fn new(local: TmuxExecutor) -> Self {
        Self {
            local: Arc::new(local),
            ssh_bin: "ssh".to_string(),
            connect_timeout_secs: 5,
            remote_tmux: TmuxExecutor::default(),
            remotes: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_ssh_bin(mut self, bin: impl Into<String>) -> Self {
        self.ssh_bin = bin.into();
        self
    }

    /// ssh `ConnectTimeout` for every remote host.
    #[must_use]
    pub fn with_connect_timeout(mut self, secs: u32) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// tmux binary / socket used on remote hosts.
    #[must_use]
    pub fn with_remote_tmux(mut self, remote: TmuxExecutor) -> Self {
        self.remote_tmux = remote;
        self
    }
}

impl ControlPlane for TmuxControlPlane {
    fn local(&self) -> Arc<dyn TmuxCommandRunner> {
        self.local.clone()
    }

    fn remote(&self, host: &str) -> Arc<dyn TmuxCommandRunner> {
        self.ssh_runner(host)
    }
}

impl TmuxControlPlane {
    fn ssh_runner(&self, host: &str) -> Arc<SshTmuxRunner> {
        let mut remotes = self.remotes.lock().unwrap_or_else(|e| e.into_inner());
        let runner = remotes.entry(host.to_string()).or_insert_with(|| {
            Arc::new(
                SshTmuxRunner::new(host)
                    .with_ssh_bin(self.ssh_bin.clone())
                    .with_connect_timeout(self.connect_timeout_secs)
                    .with_remote_tmux(self.remote_tmux.clone()),
            )
        });
        runner.clone()
    }
}
