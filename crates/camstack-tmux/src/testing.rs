//! In-memory tmux server for tests.
//!
//! Understands exactly the tmux invocations issued by this crate, keeps a
//! log of them, and simulates one pane per session whose shell gains a
//! foreground child when a command line is entered.

use std::sync::Mutex;

use crate::error::TmuxError;
use crate::executor::TmuxCommandRunner;

/// A control-plane call observed by [`FakeTmux`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TmuxCall {
    ListSessions,
    ListPanes(String),
    ProcessTable,
    NewSession(String),
    /// A full command line entered (text followed by Enter).
    SendCommand { session: String, line: String },
    Interrupt(String),
    KillSession(String),
}

impl TmuxCall {
    /// Read-only queries, as opposed to calls that change the server.
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            TmuxCall::ListSessions | TmuxCall::ListPanes(_) | TmuxCall::ProcessTable
        )
    }
}

#[derive(Debug)]
struct FakeSession {
    id: String,
    name: String,
    shell_pid: u32,
    typed: String,
    foreground: Option<(u32, String)>,
}

#[derive(Debug, Default)]
struct FakeState {
    next_id: u32,
    next_pid: u32,
    sessions: Vec<FakeSession>,
    calls: Vec<TmuxCall>,
    unavailable: bool,
}

#[derive(Debug, Default)]
pub struct FakeTmux {
    host: Option<String>,
    state: Mutex<FakeState>,
}

fn failed(stderr: impl Into<String>) -> TmuxError {
    TmuxError::CommandFailed {
        code: 1,
        stderr: stderr.into(),
    }
}

fn target_name(target: &str) -> &str {
    let t = target.strip_prefix('=').unwrap_or(target);
    t.strip_suffix(':').unwrap_or(t)
}

impl FakeTmux {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fake that reports itself as reached over ssh.
    pub fn remote(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..Self::default()
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        // A poisoned lock only means another test thread panicked.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every subsequent call fail as if the server were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Every call in order, queries included.
    pub fn calls(&self) -> Vec<TmuxCall> {
        self.lock().calls.clone()
    }

    /// Calls that changed server state, in order.
    pub fn events(&self) -> Vec<TmuxCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| !c.is_query())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn session_names(&self) -> Vec<String> {
        self.lock().sessions.iter().map(|s| s.name.clone()).collect()
    }

    /// Command line of the foreground process in a session, if one runs.
    pub fn foreground_command(&self, session: &str) -> Option<String> {
        self.lock()
            .sessions
            .iter()
            .find(|s| s.name == session)
            .and_then(|s| s.foreground.as_ref().map(|(_, cmd)| cmd.clone()))
    }

    /// Simulate a process exiting on its own.
    pub fn exit_foreground(&self, session: &str) {
        if let Some(s) = self.lock().sessions.iter_mut().find(|s| s.name == session) {
            s.foreground = None;
        }
    }

    /// Create a session out of band, as an operator or a crashed run would.
    pub fn spawn_session(&self, name: &str, command: Option<&str>) {
        let mut st = self.lock();
        let (id, shell_pid) = allocate(&mut st);
        let foreground = command.map(|c| {
            st.next_pid += 1;
            (shell_pid + st.next_pid, c.to_string())
        });
        st.sessions.push(FakeSession {
            id,
            name: name.to_string(),
            shell_pid,
            typed: String::new(),
            foreground,
        });
    }
}

fn allocate(st: &mut FakeState) -> (String, u32) {
    let id = format!("${}", st.next_id);
    st.next_id += 1;
    st.next_pid += 1;
    (id, 1000 + st.next_pid)
}

impl TmuxCommandRunner for FakeTmux {
    fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        let mut st = self.lock();
        if st.unavailable {
            return Err(TmuxError::Unavailable("fake tmux is down".to_string()));
        }
        match args {
            ["list-sessions", ..] => {
                st.calls.push(TmuxCall::ListSessions);
                if st.sessions.is_empty() {
                    return Err(failed("no server running on /tmp/tmux-fake/default"));
                }
                Ok(st
                    .sessions
                    .iter()
                    .map(|s| format!("{}\t{}\n", s.id, s.name))
                    .collect())
            }
            ["new-session", "-d", "-s", name, ..] => {
                st.calls.push(TmuxCall::NewSession(name.to_string()));
                if st.sessions.iter().any(|s| s.name == *name) {
                    return Err(failed(format!("duplicate session: {name}")));
                }
                let (id, shell_pid) = allocate(&mut st);
                st.sessions.push(FakeSession {
                    id: id.clone(),
                    name: name.to_string(),
                    shell_pid,
                    typed: String::new(),
                    foreground: None,
                });
                Ok(format!("{id}\n"))
            }
            ["list-panes", "-t", target, ..] => {
                let name = target_name(target);
                st.calls.push(TmuxCall::ListPanes(name.to_string()));
                let s = st
                    .sessions
                    .iter()
                    .find(|s| s.name == name)
                    .ok_or_else(|| failed(format!("can't find session: {name}")))?;
                Ok(format!("%0\t{}\tbash\n", s.shell_pid))
            }
            ["send-keys", "-t", target, rest @ ..] => {
                let name = target_name(target).to_string();
                let st = &mut *st;
                let s = st
                    .sessions
                    .iter_mut()
                    .find(|s| s.name == name)
                    .ok_or_else(|| failed(format!("can't find pane: {name}")))?;
                match rest {
                    ["-l", text] => s.typed.push_str(text),
                    ["Enter"] => {
                        let line = std::mem::take(&mut s.typed);
                        if !line.trim().is_empty() {
                            st.next_pid += 1;
                            s.foreground = Some((s.shell_pid + st.next_pid, line.clone()));
                        }
                        st.calls.push(TmuxCall::SendCommand {
                            session: name,
                            line,
                        });
                    }
                    ["C-c"] => {
                        s.typed.clear();
                        s.foreground = None;
                        st.calls.push(TmuxCall::Interrupt(name));
                    }
                    other => return Err(failed(format!("unsupported send-keys: {other:?}"))),
                }
                Ok(String::new())
            }
            ["kill-session", "-t", target] => {
                let name = target_name(target).to_string();
                st.calls.push(TmuxCall::KillSession(name.clone()));
                let before = st.sessions.len();
                st.sessions.retain(|s| s.name != name);
                if st.sessions.len() == before {
                    return Err(failed(format!("can't find session: {name}")));
                }
                Ok(String::new())
            }
            other => Err(failed(format!("unsupported tmux call: {other:?}"))),
        }
    }

    fn process_table(&self) -> Result<String, TmuxError> {
        let mut st = self.lock();
        if st.unavailable {
            return Err(TmuxError::Unavailable("fake tmux is down".to_string()));
        }
        st.calls.push(TmuxCall::ProcessTable);
        let mut out = String::from("1 0 /sbin/init\n");
        for s in &st.sessions {
            out.push_str(&format!("{} 1 bash\n", s.shell_pid));
            if let Some((pid, cmd)) = &s.foreground {
                out.push_str(&format!("{pid} {} {cmd}\n", s.shell_pid));
            }
        }
        Ok(out)
    }

    fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_server_reports_no_server() {
        let fake = FakeTmux::new();
        let err = fake.run(&["list-sessions", "-F", "x"]).expect_err("no server");
        assert!(err.is_missing_target());
    }

    #[test]
    fn typed_text_runs_on_enter() {
        let fake = FakeTmux::new();
        fake.run(&["new-session", "-d", "-s", "a", "-P", "-F", "#{session_id}"])
            .expect("new");
        fake.run(&["send-keys", "-t", "=a:", "-l", "sleep 5"]).expect("type");
        assert!(fake.foreground_command("a").is_none());
        fake.run(&["send-keys", "-t", "=a:", "Enter"]).expect("enter");
        assert_eq!(fake.foreground_command("a").as_deref(), Some("sleep 5"));
    }

    #[test]
    fn out_of_band_session_visible() {
        let fake = FakeTmux::new();
        fake.spawn_session("kcam_old", Some("edttake -s kcam"));
        assert_eq!(fake.session_names(), vec!["kcam_old".to_string()]);
        assert!(fake.process_table().expect("ps").contains("edttake -s kcam"));
    }
}
