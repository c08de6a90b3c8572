//! camstack-tmux: session control plane IO boundary.
//! Provides tmux subprocess execution (local and over ssh), session
//! find-or-create / send / kill, pane and process-table inspection.
//! No orchestration logic lives here.

pub mod error;
pub mod executor;
pub mod listing;
pub mod process;
pub mod quote;
pub mod session;
pub mod ssh;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use error::TmuxError;
pub use executor::{TmuxCommandRunner, TmuxExecutor};
pub use listing::{SessionInfo, list_sessions};
pub use process::{ProcessInfo, ProcessMap, foreground_child, parse_ps_output};
pub use quote::shell_quote;
pub use session::SessionHandle;
pub use ssh::SshTmuxRunner;
