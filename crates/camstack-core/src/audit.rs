//! Session audit: which of a camera's sessions are up, and which sessions
//! look like they belong to the camera but are not declared anywhere.

use camstack_tmux::{SessionHandle, TmuxError, list_sessions};
use serde::Serialize;

use crate::dependency::DependencySet;
use crate::error::CamstackError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub session: String,
    pub host: Option<String>,
    pub exists: bool,
    /// A foreground process runs in the session.
    pub alive: bool,
}

impl SessionStatus {
    pub fn inspect(handle: &SessionHandle) -> Result<Self, TmuxError> {
        let exists = handle.exists()?;
        let alive = exists && handle.is_process_alive()?;
        Ok(Self {
            session: handle.name().to_string(),
            host: handle.host().map(str::to_string),
            exists,
            alive,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionAudit {
    pub acquisition: SessionStatus,
    pub dependents: Vec<SessionStatus>,
    /// Local sessions named `<camera>_*` that no descriptor owns.
    pub strays: Vec<String>,
}

impl SessionAudit {
    pub fn all_alive(&self) -> bool {
        self.acquisition.alive && self.dependents.iter().all(|d| d.alive)
    }

    pub fn nothing_running(&self) -> bool {
        !self.acquisition.exists && self.dependents.iter().all(|d| !d.exists)
    }
}

pub fn audit_sessions(
    camera_name: &str,
    taker: &SessionHandle,
    dependents: &DependencySet,
) -> Result<SessionAudit, CamstackError> {
    let acquisition = SessionStatus::inspect(taker)?;
    let dependents_status = dependents
        .iter()
        .map(|p| SessionStatus::inspect(p.session()))
        .collect::<Result<Vec<_>, _>>()?;

    let prefix = format!("{camera_name}_");
    let strays = list_sessions(taker.runner())?
        .into_iter()
        .map(|s| s.name)
        .filter(|name| name.starts_with(&prefix) && name != taker.name())
        .filter(|name| {
            !dependents
                .iter()
                .any(|p| p.session().host().is_none() && p.session().name() == name)
        })
        .collect::<Vec<_>>();
    if !strays.is_empty() {
        tracing::warn!(camera = camera_name, ?strays, "undeclared sessions");
    }

    Ok(SessionAudit {
        acquisition,
        dependents: dependents_status,
        strays,
    })
}
