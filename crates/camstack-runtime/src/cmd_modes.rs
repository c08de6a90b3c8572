//! `camstack modes` and `camstack check`.

use std::fmt::Write;

use camstack_core::{CameraDefinition, GrabberLayout, ModeId, ModeTable, PlanStep};

/// Entry point for `camstack modes`.
pub fn cmd_modes(def: &CameraDefinition) -> anyhow::Result<()> {
    let table = def.mode_table()?;
    print!("{}", format_modes(&table, def.initial_mode()));
    Ok(())
}

pub fn format_modes(table: &ModeTable, initial: &ModeId) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "  {:<6} {:<20} {:<9} {:>12} {:>12}",
        "MODE", "WINDOW", "SIZE", "FPS", "TINT"
    );
    for (id, mode) in table.iter() {
        let mark = if id == initial { '*' } else { ' ' };
        let fps = mode.fps.map(|v| format!("{v:.3}")).unwrap_or_else(|| "-".to_string());
        let tint = mode.tint.map(|v| format!("{v:.3e}")).unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{mark} {:<6} {:<20} {:<9} {fps:>12} {tint:>12}",
            id.to_string(),
            mode.window.to_string(),
            format!("{}x{}", mode.width(), mode.height()),
        );
    }
    out
}

/// Entry point for `camstack check`: the definition already validated on
/// load; print what `run` would do.
pub fn cmd_check(def: &CameraDefinition) -> anyhow::Result<()> {
    let plane = def.control_plane();
    let table = def.mode_table()?;
    let mode = table.get(def.initial_mode())?;
    let camera = def.camera_control();
    let layout = GrabberLayout::for_mode(mode, camera.casts_byte_pairs());
    let acq = def.acquisition_config();
    let (_, dependents) = def.sessions(&plane)?;

    println!("camera   {} ({})", def.name(), camera.family());
    println!("stream   {}", def.stream_name());
    println!(
        "mode     {} -> grabber {}x{} in {}",
        def.initial_mode(),
        layout.grabber_width(),
        layout.height,
        acq.config_path().display()
    );
    println!("taker    {}: {}", acq.taker_session_name(), acq.taker_command(&layout));
    for p in dependents.iter() {
        let d = p.descriptor();
        println!(
            "depends  {}@{}: {}",
            d.session,
            d.remote_host.as_deref().unwrap_or("local"),
            p.command_line()
        );
    }
    println!("start    {}", describe_plan(&dependents.start_plan(), |i| {
        dependents.get(i).map(|p| p.descriptor().session.clone()).unwrap_or_default()
    }));
    println!("stop     {}", describe_plan(&dependents.stop_plan(), |i| {
        dependents.get(i).map(|p| p.descriptor().session.clone()).unwrap_or_default()
    }));
    Ok(())
}

fn describe_plan(plan: &[PlanStep], name: impl Fn(usize) -> String) -> String {
    if plan.is_empty() {
        return "-".to_string();
    }
    plan.iter()
        .map(|step| match *step {
            PlanStep::Start(i) => format!("+{}", name(i)),
            PlanStep::Stop(i) => format!("-{}", name(i)),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use camstack_core::cred2::chuck_modes;

    #[test]
    fn modes_table_marks_initial() {
        let table = chuck_modes().expect("table");
        let out = format_modes(&table, &ModeId::Index(3));
        let marked: Vec<&str> = out.lines().filter(|l| l.starts_with('*')).collect();
        assert_eq!(marked.len(), 1);
        assert!(marked[0].contains("288-351 224-287"));
        assert!(marked[0].contains("64x64"));
        assert!(out.lines().any(|l| l.contains("full") && l.contains("640x512")));
    }

    #[test]
    fn plan_description() {
        let names = ["tcp", "recv"];
        let plan = [PlanStep::Start(1), PlanStep::Stop(0), PlanStep::Start(0)];
        assert_eq!(describe_plan(&plan, |i| names[i].to_string()), "+recv -tcp +tcp");
        assert_eq!(describe_plan(&[], |i| names[i].to_string()), "-");
    }
}
