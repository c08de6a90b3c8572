//! Error types for the session control plane.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TmuxError {
    #[error("tmux command failed (exit code {code}): {stderr}")]
    CommandFailed { code: i32, stderr: String },

    #[error("control plane unreachable: {0}")]
    Unavailable(String),

    #[error("failed to parse {what} line {line_num}: {detail}")]
    ParseError {
        what: &'static str,
        line_num: usize,
        detail: String,
    },

    #[error("tmux io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TmuxError {
    /// True when the multiplexer (or the transport to it) could not be reached
    /// at all, as opposed to tmux answering with a non-zero status.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, TmuxError::Unavailable(_) | TmuxError::Io(_))
    }

    /// True when tmux reported that no server / session exists for the target.
    pub fn is_missing_target(&self) -> bool {
        match self {
            TmuxError::CommandFailed { stderr, .. } => {
                let s = stderr.to_ascii_lowercase();
                s.contains("no server running")
                    || s.contains("error connecting to")
                    || s.contains("can't find session")
                    || s.contains("can't find pane")
                    || s.contains("session not found")
                    || s.contains("no sessions")
            }
            _ => false,
        }
    }
}
