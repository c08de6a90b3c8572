//! Operator prompt: line commands and their effect on a controller.

use std::str::FromStr;

use camstack_core::{AcquisitionController, CameraRequest, ControllerState, ModeId};

#[derive(Debug, Clone, PartialEq)]
pub enum OperatorCommand {
    /// Switch to a mode; the first one also configures and starts.
    Mode(ModeId),
    Status,
    Keywords,
    /// Serial command passed through to the camera.
    Raw(String),
    /// Stop and start again in the current mode.
    Restart,
    /// Camera setting or read-back (`fps`, `tint`, `gain`, `ndr`, `temp`,
    /// `setpoint`, `synchro`).
    Camera(CameraRequest),
    Quit,
}

impl FromStr for OperatorCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((w, r)) => (w, r.trim()),
            None => (line, ""),
        };
        match (word, rest) {
            ("mode", "") => Err("usage: mode <id>".to_string()),
            ("mode", id) => Ok(OperatorCommand::Mode(id.parse().unwrap_or_else(|e| match e {}))),
            ("status", "") => Ok(OperatorCommand::Status),
            ("keywords", "") => Ok(OperatorCommand::Keywords),
            ("raw", "") => Err("usage: raw <serial command>".to_string()),
            ("raw", cmd) => Ok(OperatorCommand::Raw(cmd.to_string())),
            ("restart", "") => Ok(OperatorCommand::Restart),
            ("quit" | "exit", "") => Ok(OperatorCommand::Quit),
            _ => match CameraRequest::parse_words(word, rest) {
                Some(parsed) => parsed.map(OperatorCommand::Camera),
                None => Err(format!(
                    "unknown command {line:?} (mode <id> | status | keywords | raw <cmd> | restart | {} | quit)",
                    CameraRequest::WORDS.join(" | ")
                )),
            },
        }
    }
}

/// Apply one command and render the reply shown to the operator.
pub fn execute(ctrl: &mut AcquisitionController, cmd: &OperatorCommand) -> anyhow::Result<String> {
    match cmd {
        OperatorCommand::Mode(id) => {
            match ctrl.state() {
                ControllerState::Uninitialized | ControllerState::Configured => {
                    ctrl.configure(id.clone())?;
                    ctrl.start()?;
                }
                _ => ctrl.change_mode(id.clone())?,
            }
            Ok(describe_mode(ctrl))
        }
        OperatorCommand::Status => Ok(serde_json::to_string_pretty(&ctrl.status())?),
        OperatorCommand::Keywords => Ok(serde_json::to_string_pretty(ctrl.keywords())?),
        OperatorCommand::Raw(command) => Ok(ctrl.send_raw(command)?.trim().to_string()),
        OperatorCommand::Restart => {
            ctrl.restart()?;
            Ok(describe_mode(ctrl))
        }
        OperatorCommand::Camera(request) => {
            let reply = ctrl.camera_request(request)?;
            Ok(format!("{}: {request} -> {reply}", ctrl.name()))
        }
        OperatorCommand::Quit => {
            ctrl.close()?;
            Ok(format!("{}: closed", ctrl.name()))
        }
    }
}

fn describe_mode(ctrl: &AcquisitionController) -> String {
    match (ctrl.current_mode_id(), ctrl.current_mode()) {
        (Some(id), Some(mode)) => format!(
            "{}: mode {id} ({}x{}, window {})",
            ctrl.name(),
            mode.width(),
            mode.height(),
            mode.window
        ),
        _ => format!("{}: {}", ctrl.name(), ctrl.state()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    use camstack_core::{
        AcquisitionConfig, CameraControl, CameraDefinition, CameraError, CameraMode,
        CamstackError, ControlPlane, ControllerParts, CropWindow, DependencySet, FrameGrabber,
        KeywordValue, ModeTable, SensorExtent, SerialLink, StreamKeywords,
    };
    use camstack_tmux::TmuxCommandRunner;
    use camstack_tmux::testing::FakeTmux;

    #[test]
    fn parse_commands() {
        assert_eq!("mode 3".parse::<OperatorCommand>(), Ok(OperatorCommand::Mode(ModeId::Index(3))));
        assert_eq!("  mode full ".parse::<OperatorCommand>(), Ok(OperatorCommand::Mode(ModeId::full())));
        assert_eq!("status".parse::<OperatorCommand>(), Ok(OperatorCommand::Status));
        assert_eq!(
            "raw set fps 100".parse::<OperatorCommand>(),
            Ok(OperatorCommand::Raw("set fps 100".to_string()))
        );
        assert_eq!("exit".parse::<OperatorCommand>(), Ok(OperatorCommand::Quit));
        assert!("mode".parse::<OperatorCommand>().is_err());
        assert!("status now".parse::<OperatorCommand>().is_err());
        assert_eq!(
            "fps 100".parse::<OperatorCommand>(),
            Ok(OperatorCommand::Camera(CameraRequest::Fps(Some(100.0))))
        );
        assert_eq!(
            "synchro off".parse::<OperatorCommand>(),
            Ok(OperatorCommand::Camera(CameraRequest::Synchro(false)))
        );
        assert_eq!("temp".parse::<OperatorCommand>(), Ok(OperatorCommand::Camera(CameraRequest::Temperature)));
        assert!("ndr many".parse::<OperatorCommand>().is_err());
        assert!("zoom 2".parse::<OperatorCommand>().is_err());
    }

    struct Plane(Arc<FakeTmux>);

    impl ControlPlane for Plane {
        fn local(&self) -> Arc<dyn TmuxCommandRunner> {
            self.0.clone()
        }

        fn remote(&self, _host: &str) -> Arc<dyn TmuxCommandRunner> {
            self.0.clone()
        }
    }

    struct Echo;

    impl SerialLink for Echo {
        fn send(&mut self, command: &str) -> Result<String, CameraError> {
            Ok(format!("{command}\r\n"))
        }
    }

    struct NoopGrabber;

    impl FrameGrabber for NoopGrabber {
        fn configure(&mut self, _cfg: &Path, _unit: u32, _channel: u32) -> Result<(), CamstackError> {
            Ok(())
        }

        fn open_serial(&mut self, _unit: u32, _channel: u32) -> Result<Box<dyn SerialLink>, CamstackError> {
            Ok(Box::new(Echo))
        }
    }

    #[test]
    fn prompt_session() {
        let dir = tempfile::tempdir().expect("tempdir");
        let template = dir.path().join("base.cfg");
        fs::write(&template, "depth: 14\n").expect("template");
        let doc = format!(
            r#"
[camera]
name = "kcam"
family = "generic"
mode = 0
base_config = "{}"

[grabber]
config_dir = "{}"

[timings]
taker_settle_ms = 0

[sensor]
width = 64
height = 64

[[mode]]
id = 0
x0 = 0
x1 = 63
y0 = 0
y1 = 63

[[mode]]
id = 1
x0 = 16
x1 = 47
y0 = 16
y1 = 47
"#,
            template.display(),
            dir.path().display()
        );
        let def = CameraDefinition::from_toml(&doc).expect("definition");
        let fake = Arc::new(FakeTmux::new());
        let mut ctrl = def
            .build_controller(&Plane(fake.clone()), Box::new(NoopGrabber))
            .expect("controller");

        let reply = execute(&mut ctrl, &OperatorCommand::Mode(ModeId::Index(0))).expect("start");
        assert_eq!(reply, "kcam: mode 0 (64x64, window 0-63 0-63)");
        assert_eq!(ctrl.state(), ControllerState::Running);

        let reply = execute(&mut ctrl, &OperatorCommand::Mode(ModeId::Index(1))).expect("change");
        assert_eq!(reply, "kcam: mode 1 (32x32, window 16-47 16-47)");

        let reply = execute(&mut ctrl, &OperatorCommand::Raw("fps raw".to_string())).expect("raw");
        assert_eq!(reply, "fps raw");

        let status = execute(&mut ctrl, &OperatorCommand::Status).expect("status");
        let json: serde_json::Value = serde_json::from_str(&status).expect("json");
        assert_eq!(json["state"], "running");
        assert_eq!(json["width"], 32);

        assert!(execute(&mut ctrl, &OperatorCommand::Mode(ModeId::Index(9))).is_err());
        assert_eq!(ctrl.state(), ControllerState::Running);

        let reply = execute(&mut ctrl, &OperatorCommand::Quit).expect("quit");
        assert_eq!(reply, "kcam: closed");
        assert!(fake.session_names().is_empty());
    }

    /// Camera that only knows its sensor temperature.
    struct Thermo;

    impl CameraControl for Thermo {
        fn family(&self) -> &str {
            "thermo"
        }

        fn request(
            &mut self,
            link: &mut dyn SerialLink,
            request: &CameraRequest,
            keywords: &mut StreamKeywords,
        ) -> Result<String, CameraError> {
            match request {
                CameraRequest::Temperature => {
                    let reply = link.send("temp")?;
                    keywords.set("DET-TMP", 233.15);
                    Ok(reply.trim().to_string())
                }
                other => Err(CameraError::Unsupported {
                    family: "thermo".to_string(),
                    request: other.to_string(),
                }),
            }
        }
    }

    #[test]
    fn camera_commands_reach_the_family() {
        let dir = tempfile::tempdir().expect("tempdir");
        let template = dir.path().join("base.cfg");
        fs::write(&template, "depth: 14\n").expect("template");
        let mut config = AcquisitionConfig::new("tcam", "tcam", &template);
        config.config_dir = dir.path().to_path_buf();
        config.taker_settle = std::time::Duration::ZERO;
        let fake = Arc::new(FakeTmux::new());
        let runner: Arc<dyn TmuxCommandRunner> = fake;
        let mut ctrl = AcquisitionController::new(ControllerParts {
            config,
            modes: ModeTable::new(
                SensorExtent::new(16, 16),
                [(ModeId::Index(0), CameraMode::new(CropWindow::new(0, 15, 0, 15)))],
            )
            .expect("modes"),
            camera: Box::new(Thermo),
            grabber: Box::new(NoopGrabber),
            runner,
            dependents: DependencySet::empty(),
        })
        .expect("controller");

        let cmd = "temp".parse::<OperatorCommand>().expect("parse");
        assert!(execute(&mut ctrl, &cmd).is_err());

        execute(&mut ctrl, &OperatorCommand::Mode(ModeId::Index(0))).expect("start");
        let reply = execute(&mut ctrl, &cmd).expect("temp");
        assert_eq!(reply, "tcam: temp -> temp");
        assert_eq!(ctrl.keywords().get("DET-TMP"), Some(&KeywordValue::Float(233.15)));

        let fps = "fps 100".parse::<OperatorCommand>().expect("parse");
        let err = execute(&mut ctrl, &fps).expect_err("unsupported");
        assert!(err.to_string().contains("does not support"));
        assert_eq!(ctrl.state(), ControllerState::Running);
    }
}
