//! Session and pane listings, format strings and parsers.

use serde::Serialize;

use crate::error::TmuxError;
use crate::executor::TmuxCommandRunner;

/// Tab-delimited format string for `tmux list-sessions -F`.
pub const LIST_SESSIONS_FORMAT: &str = "#{session_id}\t#{session_name}";

/// Tab-delimited format string for `tmux list-panes -F`.
pub const LIST_PANES_FORMAT: &str = "#{pane_id}\t#{pane_pid}\t#{pane_current_command}";

/// One tmux session as seen by `list-sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub name: String,
}

/// One pane of a session as seen by `list-panes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneInfo {
    pub pane_id: String,
    /// PID of the pane's shell (tmux `#{pane_pid}`).
    pub pane_pid: Option<u32>,
    pub current_cmd: String,
}

/// Execute `tmux list-sessions` and parse the output.
///
/// A server that is not running simply has no sessions.
pub fn list_sessions(runner: &dyn TmuxCommandRunner) -> Result<Vec<SessionInfo>, TmuxError> {
    match runner.run(&["list-sessions", "-F", LIST_SESSIONS_FORMAT]) {
        Ok(output) => parse_list_sessions_output(&output),
        Err(e) if e.is_missing_target() => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Execute `tmux list-panes` for one session (exact name match).
///
/// Returns an empty list if the session does not exist.
pub fn list_session_panes(
    runner: &dyn TmuxCommandRunner,
    session_name: &str,
) -> Result<Vec<PaneInfo>, TmuxError> {
    let target = format!("={session_name}");
    match runner.run(&["list-panes", "-t", &target, "-F", LIST_PANES_FORMAT]) {
        Ok(output) => parse_list_panes_output(&output),
        Err(e) if e.is_missing_target() => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Parse the raw output of `tmux list-sessions -F <LIST_SESSIONS_FORMAT>`.
pub fn parse_list_sessions_output(output: &str) -> Result<Vec<SessionInfo>, TmuxError> {
    let mut sessions = Vec::new();
    for (idx, line) in output.lines().enumerate() {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            continue;
        }
        let (id, name) = trimmed
            .split_once('\t')
            .ok_or_else(|| TmuxError::ParseError {
                what: "list-sessions",
                line_num: idx + 1,
                detail: "expected 2 tab-separated fields".to_string(),
            })?;
        sessions.push(SessionInfo {
            session_id: id.to_string(),
            name: name.to_string(),
        });
    }
    Ok(sessions)
}

/// Parse the raw output of `tmux list-panes -F <LIST_PANES_FORMAT>`.
pub fn parse_list_panes_output(output: &str) -> Result<Vec<PaneInfo>, TmuxError> {
    let mut panes = Vec::new();
    for (idx, line) in output.lines().enumerate() {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            continue;
        }
        let parts: Vec<&str> = trimmed.split('\t').collect();
        if parts.len() < 2 {
            return Err(TmuxError::ParseError {
                what: "list-panes",
                line_num: idx + 1,
                detail: format!(
                    "expected at least 2 tab-separated fields, got {}",
                    parts.len()
                ),
            });
        }
        panes.push(PaneInfo {
            pane_id: parts[0].to_string(),
            pane_pid: parts[1].trim().parse().ok(),
            current_cmd: parts.get(2).map(|s| s.to_string()).unwrap_or_default(),
        });
    }
    Ok(panes)
}
