//! Process-table inspection used for session liveness.

use std::collections::HashMap;

/// One entry from `ps -eo pid=,ppid=,args=`.
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub pid: u32,
    pub ppid: u32,
    pub args: String,
}

/// Snapshot of all running processes on a host, keyed by PID.
pub type ProcessMap = HashMap<u32, ProcessInfo>;

/// Parse `ps -eo pid=,ppid=,args=` output. Malformed lines are skipped.
pub fn parse_ps_output(output: &str) -> ProcessMap {
    let mut map = ProcessMap::new();
    for line in output.lines() {
        if let Some(info) = parse_ps_line(line) {
            map.insert(info.pid, info);
        }
    }
    map
}

fn parse_ps_line(line: &str) -> Option<ProcessInfo> {
    let s = line.trim();
    if s.is_empty() {
        return None;
    }
    // pid: first whitespace-delimited token
    let ws = s.find(|c: char| c.is_ascii_whitespace())?;
    let pid: u32 = s[..ws].parse().ok()?;
    let s = s[ws..].trim_start();
    // ppid: second token
    let ws = s.find(|c: char| c.is_ascii_whitespace()).unwrap_or(s.len());
    let ppid: u32 = s[..ws].parse().ok()?;
    let args = if ws < s.len() {
        s[ws..].trim_start().to_string()
    } else {
        String::new()
    };
    Some(ProcessInfo { pid, ppid, args })
}

/// The foreground process of a pane: a direct child of the pane's shell.
///
/// With several children the lowest PID wins, which is the oldest one on
/// hosts without PID wraparound.
pub fn foreground_child(shell_pid: u32, processes: &ProcessMap) -> Option<&ProcessInfo> {
    processes
        .values()
        .filter(|p| p.ppid == shell_pid)
        .min_by_key(|p| p.pid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ps_output_basic() {
        let output = "    1     0 /sbin/init\n12345  6789 edttake -s kcam -u 1 -c 0 -l 0 -N 4\n";
        let map = parse_ps_output(output);
        assert_eq!(map.len(), 2);
        assert_eq!(map[&1].ppid, 0);
        assert_eq!(map[&1].args, "/sbin/init");
        assert_eq!(map[&12345].ppid, 6789);
        assert_eq!(map[&12345].args, "edttake -s kcam -u 1 -c 0 -l 0 -N 4");
    }

    #[test]
    fn parse_ps_output_empty_lines_skipped() {
        let map = parse_ps_output("\n   \n42 1 sleep 60\n");
        assert_eq!(map.len(), 1);
        assert!(map.contains_key(&42));
    }

    #[test]
    fn parse_ps_output_no_args() {
        let map = parse_ps_output("100 50\n");
        assert_eq!(map[&100].args, "");
    }

    #[test]
    fn parse_ps_output_skips_header_like_lines() {
        let map = parse_ps_output("PID PPID COMMAND\n7 1 bash\n");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn foreground_child_found() {
        let map = parse_ps_output("10 1 bash\n11 10 shmimTCPtransmit glint\n12 11 helper\n");
        let child = foreground_child(10, &map).expect("child");
        assert_eq!(child.pid, 11);
    }

    #[test]
    fn idle_shell_has_no_foreground_child() {
        let map = parse_ps_output("10 1 bash\n");
        assert!(foreground_child(10, &map).is_none());
    }

    #[test]
    fn oldest_child_wins() {
        let map = parse_ps_output("10 1 bash\n15 10 b\n12 10 a\n");
        assert_eq!(foreground_child(10, &map).map(|p| p.pid), Some(12));
    }
}
