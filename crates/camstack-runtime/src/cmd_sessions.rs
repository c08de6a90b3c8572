//! `camstack stop` and `camstack status`: work from the camera definition
//! alone, without touching the grabber or the camera.

use camstack_core::controller::teardown;
use camstack_core::{CameraDefinition, SessionAudit, SessionStatus, audit_sessions};

/// Entry point for `camstack stop`.
pub fn cmd_stop(def: &CameraDefinition) -> anyhow::Result<()> {
    let plane = def.control_plane();
    let (mut taker, mut dependents) = def.sessions(&plane)?;
    teardown(&mut dependents, &mut taker)?;
    println!("{}: stopped", def.name());
    Ok(())
}

/// Entry point for `camstack status`.
pub fn cmd_status(def: &CameraDefinition, json: bool) -> anyhow::Result<()> {
    let plane = def.control_plane();
    let (taker, dependents) = def.sessions(&plane)?;
    let audit = audit_sessions(def.name(), &taker, &dependents)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&audit)?);
    } else {
        print!("{}", format_audit(&audit));
    }
    Ok(())
}

fn state_label(s: &SessionStatus) -> &'static str {
    match (s.exists, s.alive) {
        (_, true) => "running",
        (true, false) => "idle",
        (false, false) => "absent",
    }
}

fn format_row(s: &SessionStatus) -> String {
    format!(
        "{:<28} {:<12} {}\n",
        s.session,
        s.host.as_deref().unwrap_or("local"),
        state_label(s)
    )
}

pub fn format_audit(audit: &SessionAudit) -> String {
    let mut out = format!("{:<28} {:<12} {}\n", "SESSION", "HOST", "STATE");
    out.push_str(&format_row(&audit.acquisition));
    for d in &audit.dependents {
        out.push_str(&format_row(d));
    }
    for stray in &audit.strays {
        out.push_str(&format!("{stray:<28} {:<12} stray\n", "local"));
    }
    out
}
