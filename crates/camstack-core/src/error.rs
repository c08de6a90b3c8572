//! Error types for lifecycle coordination.
//!
//! `CamstackError` is what controller callers see. Everything fatal
//! propagates; nothing here is retried except the crop check inside the
//! camera family adapter.

use std::path::PathBuf;

use camstack_tmux::TmuxError;
use thiserror::Error;

use crate::controller::ControllerState;
use crate::mode::{CropWindow, ModeError, ModeId};
use crate::template::TemplateError;

/// Failures reported by a camera over its serial command link.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera rejected {command:?}: {reply}")]
    Rejected { command: String, reply: String },

    #[error("unparseable reply to {command:?}: {reply:?}")]
    BadReply { command: String, reply: String },

    #[error("cannot set crop {requested} after {attempts} tries (camera reports {reported})")]
    CropMismatch {
        requested: CropWindow,
        reported: CropWindow,
        attempts: u32,
    },

    #[error("serial link error: {0}")]
    Link(String),

    #[error("{family} camera does not support {request:?}")]
    Unsupported { family: String, request: String },

    #[error("invalid argument for {request:?}: {reason}")]
    InvalidArgument { request: String, reason: String },
}

/// Camera definition loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid camera definition: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("generic camera needs [sensor] and at least one [[mode]]")]
    MissingModeTable,

    #[error("mode {0} is not in the camera's mode table")]
    UnknownMode(ModeId),

    #[error(transparent)]
    Mode(#[from] ModeError),

    #[error("dependent {session}: {source}")]
    Template {
        session: String,
        #[source]
        source: TemplateError,
    },

    #[error("session {0} is declared more than once")]
    DuplicateSession(String),
}

#[derive(Debug, Error)]
pub enum CamstackError {
    /// tmux (or the ssh transport to it) could not be reached.
    #[error("control plane unavailable: {0}")]
    ControlPlaneUnavailable(#[source] TmuxError),

    /// tmux answered, but not in a way the session logic can tolerate.
    #[error("tmux error: {0}")]
    Tmux(#[source] TmuxError),

    /// The vendor configuration tool refused the frame-grabber config.
    #[error("configuration rejected: {0}")]
    ConfigurationRejected(String),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error("resource missing: {}", .0.display())]
    ResourceMissing(PathBuf),

    #[error(transparent)]
    Mode(#[from] ModeError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("session {0} is declared more than once")]
    DuplicateSession(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot {action} while controller is {state}")]
    InvalidTransition {
        action: &'static str,
        state: ControllerState,
    },

    #[error("acquisition session {0} is still running, refusing to change grabber config")]
    AcquisitionRunning(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TmuxError> for CamstackError {
    fn from(e: TmuxError) -> Self {
        if e.is_unavailable() {
            CamstackError::ControlPlaneUnavailable(e)
        } else {
            CamstackError::Tmux(e)
        }
    }
}

impl CamstackError {
    /// Rejections by the grabber tool or the camera, including an exhausted
    /// crop retry.
    pub fn is_configuration_rejected(&self) -> bool {
        matches!(
            self,
            CamstackError::ConfigurationRejected(_) | CamstackError::Camera(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_tmux_maps_to_control_plane() {
        let err: CamstackError = TmuxError::Unavailable("ssh sc6: timeout".to_string()).into();
        assert!(matches!(err, CamstackError::ControlPlaneUnavailable(_)));
    }

    #[test]
    fn tmux_refusal_stays_tmux() {
        let err: CamstackError = TmuxError::CommandFailed {
            code: 1,
            stderr: "bad".to_string(),
        }
        .into();
        assert!(matches!(err, CamstackError::Tmux(_)));
    }

    #[test]
    fn crop_mismatch_is_configuration_rejected() {
        let w = CropWindow::new(0, 9, 0, 9);
        let err: CamstackError = CameraError::CropMismatch {
            requested: w,
            reported: w,
            attempts: 3,
        }
        .into();
        assert!(err.is_configuration_rejected());
    }
}
