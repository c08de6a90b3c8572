//! Camera definitions: one TOML file per camera, describing the grabber,
//! the mode to start in, and the dependent processes to run.
//!
//! ```toml
//! [camera]
//! name = "glint"
//! family = "glint"
//! mode = 12
//! base_config = "/home/scexao/src/camstack/config/cred2_14bit.cfg"
//!
//! [[dependent]]
//! session = "glint_tcp"
//! command = "shmimTCPtransmit %s %s %u"
//! args = ["glint", "10.20.70.1", 30108]
//! kill_upon_create = true
//! start_order = 1
//! kill_order = 0
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use camstack_tmux::{SessionHandle, TmuxExecutor};
use serde::{Deserialize, Serialize};

use crate::camera::{CameraControl, GenericCamera};
use crate::controller::{AcquisitionConfig, AcquisitionController, ControllerParts};
use crate::cred2::{Cred2, chuck_modes, cred2_modes, glint_modes, rajni_modes};
use crate::dependency::{DependencySet, session_key};
use crate::error::{CamstackError, ConfigError};
use crate::grabber::{EdtGrabber, FrameGrabber};
use crate::mode::{CameraMode, CropWindow, ModeId, ModeTable, SensorExtent};
use crate::process::{ProcessDescriptor, SchedulingTag};
use crate::transport::{ControlPlane, TmuxControlPlane};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFamily {
    /// No serial programming; modes come from `[[mode]]`.
    Generic,
    Cred2,
    Rajni,
    Glint,
    Chuck,
}

impl CameraFamily {
    fn cred2_model(self) -> Option<&'static str> {
        match self {
            CameraFamily::Generic => None,
            CameraFamily::Cred2 => Some("cred2"),
            CameraFamily::Rajni => Some("rajni"),
            CameraFamily::Glint => Some("glint"),
            CameraFamily::Chuck => Some("chuck"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CameraSection {
    pub name: String,
    /// Defaults to the camera name.
    #[serde(default)]
    pub stream: Option<String>,
    pub family: CameraFamily,
    #[serde(default)]
    pub unit: u32,
    #[serde(default)]
    pub channel: u32,
    #[serde(default = "default_mode")]
    pub mode: ModeId,
    pub base_config: PathBuf,
    /// Pack byte pairs into 16-bit pixels (generic family only).
    #[serde(default)]
    pub byte_pair_cast: bool,
    /// cpuset / realtime priority of the taker process.
    #[serde(default)]
    pub scheduling: Option<SchedulingTag>,
}

fn default_mode() -> ModeId {
    ModeId::full()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GrabberSection {
    pub initcam: PathBuf,
    pub serial_cmd: PathBuf,
    pub edttake: PathBuf,
    pub config_dir: PathBuf,
}

impl Default for GrabberSection {
    fn default() -> Self {
        Self {
            initcam: PathBuf::from("/opt/EDTpdv/initcam"),
            serial_cmd: PathBuf::from("/opt/EDTpdv/serial_cmd"),
            edttake: PathBuf::from("edttake"),
            config_dir: PathBuf::from("/tmp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TimingsSection {
    pub taker_settle_ms: u64,
    pub kill_grace_ms: u64,
    pub crop_settle_ms: u64,
}

impl Default for TimingsSection {
    fn default() -> Self {
        Self {
            taker_settle_ms: 1000,
            kill_grace_ms: 0,
            crop_settle_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TmuxSection {
    pub bin: String,
    pub socket_name: Option<String>,
    pub socket_path: Option<String>,
    pub ssh_bin: String,
    /// ssh `ConnectTimeout` for remote dependents.
    pub ssh_connect_timeout_s: u32,
}

impl Default for TmuxSection {
    fn default() -> Self {
        Self {
            bin: "tmux".to_string(),
            socket_name: None,
            socket_path: None,
            ssh_bin: "ssh".to_string(),
            ssh_connect_timeout_s: 5,
        }
    }
}

/// One `[[mode]]` entry for the generic family.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModeEntry {
    pub id: ModeId,
    pub x0: u32,
    pub x1: u32,
    pub y0: u32,
    pub y1: u32,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub tint: Option<f64>,
}

impl ModeEntry {
    fn to_mode(&self) -> (ModeId, CameraMode) {
        (
            self.id.clone(),
            CameraMode {
                window: CropWindow::new(self.x0, self.x1, self.y0, self.y1),
                fps: self.fps,
                tint: self.tint,
            },
        )
    }
}

/// A validated camera definition.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CameraDefinition {
    pub camera: CameraSection,
    #[serde(default)]
    pub grabber: GrabberSection,
    #[serde(default)]
    pub timings: TimingsSection,
    #[serde(default)]
    pub tmux: TmuxSection,
    #[serde(default)]
    pub sensor: Option<SensorExtent>,
    #[serde(default, rename = "mode")]
    pub modes: Vec<ModeEntry>,
    #[serde(default, rename = "dependent")]
    pub dependents: Vec<ProcessDescriptor>,
}

impl CameraDefinition {
    /// Parse and validate.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let def: Self = toml::from_str(s)?;
        def.validate()?;
        Ok(def)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let def = Self::from_toml(&s)?;
        tracing::debug!(path = %path.display(), camera = %def.camera.name, "camera definition loaded");
        Ok(def)
    }

    /// Mode table, start mode, command templates and session uniqueness.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let table = self.mode_table()?;
        if !table.contains(&self.camera.mode) {
            return Err(ConfigError::UnknownMode(self.camera.mode.clone()));
        }
        let mut seen = HashSet::new();
        seen.insert(session_key(None, &self.taker_session_name()));
        for d in &self.dependents {
            d.command_line().map_err(|source| ConfigError::Template {
                session: d.session.clone(),
                source,
            })?;
            let key = session_key(d.remote_host.as_deref(), &d.session);
            if !seen.insert(key.clone()) {
                return Err(ConfigError::DuplicateSession(key));
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.camera.name
    }

    pub fn stream_name(&self) -> &str {
        self.camera.stream.as_deref().unwrap_or(&self.camera.name)
    }

    pub fn initial_mode(&self) -> &ModeId {
        &self.camera.mode
    }

    pub fn taker_session_name(&self) -> String {
        format!("{}_edt", self.camera.name)
    }

    pub fn mode_table(&self) -> Result<ModeTable, ConfigError> {
        let table = match self.camera.family {
            CameraFamily::Generic => {
                let sensor = self.sensor.ok_or(ConfigError::MissingModeTable)?;
                if self.modes.is_empty() {
                    return Err(ConfigError::MissingModeTable);
                }
                ModeTable::new(sensor, self.modes.iter().map(ModeEntry::to_mode))?
            }
            CameraFamily::Cred2 => cred2_modes()?,
            CameraFamily::Rajni => rajni_modes()?,
            CameraFamily::Glint => glint_modes()?,
            CameraFamily::Chuck => chuck_modes()?,
        };
        Ok(table)
    }

    pub fn camera_control(&self) -> Box<dyn CameraControl> {
        match self.camera.family.cred2_model() {
            Some(model) => Box::new(
                Cred2::new(model)
                    .with_crop_settle(Duration::from_millis(self.timings.crop_settle_ms)),
            ),
            None => Box::new(GenericCamera::new().with_byte_pair_cast(self.camera.byte_pair_cast)),
        }
    }

    pub fn acquisition_config(&self) -> AcquisitionConfig {
        let mut config = AcquisitionConfig::new(
            self.camera.name.clone(),
            self.stream_name(),
            self.camera.base_config.clone(),
        );
        config.unit = self.camera.unit;
        config.channel = self.camera.channel;
        config.config_dir = self.grabber.config_dir.clone();
        config.edttake = self.grabber.edttake.clone();
        config.scheduling = self.camera.scheduling.clone();
        config.taker_settle = Duration::from_millis(self.timings.taker_settle_ms);
        config.kill_grace = self.kill_grace();
        config
    }

    fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.timings.kill_grace_ms)
    }

    pub fn edt_grabber(&self) -> EdtGrabber {
        EdtGrabber::new(self.grabber.initcam.clone(), self.grabber.serial_cmd.clone())
    }

    /// Local tmux executor from `[tmux]`.
    pub fn tmux_executor(&self) -> TmuxExecutor {
        let mut exec = TmuxExecutor::new(self.tmux.bin.clone());
        if let Some(name) = &self.tmux.socket_name {
            exec = exec.with_socket_name(name.clone());
        }
        if let Some(path) = &self.tmux.socket_path {
            exec = exec.with_socket_path(path.clone());
        }
        exec
    }

    pub fn control_plane(&self) -> TmuxControlPlane {
        TmuxControlPlane::new(self.tmux_executor())
            .with_ssh_bin(self.tmux.ssh_bin.clone())
            .with_connect_timeout(self.tmux.ssh_connect_timeout_s)
    }

    pub fn dependency_set(&self, plane: &dyn ControlPlane) -> Result<DependencySet, CamstackError> {
        DependencySet::assemble(self.dependents.iter().cloned(), plane, self.kill_grace())
    }

    /// The taker session and the dependency set, without camera or grabber.
    /// Enough to audit or tear down a camera.
    pub fn sessions(
        &self,
        plane: &dyn ControlPlane,
    ) -> Result<(SessionHandle, DependencySet), CamstackError> {
        let taker = SessionHandle::new(self.taker_session_name(), plane.local())
            .with_kill_grace(self.kill_grace());
        Ok((taker, self.dependency_set(plane)?))
    }

    /// Assemble an unconfigured controller.
    pub fn build_controller(
        &self,
        plane: &dyn ControlPlane,
        grabber: Box<dyn FrameGrabber>,
    ) -> Result<AcquisitionController, CamstackError> {
        AcquisitionController::new(ControllerParts {
            config: self.acquisition_config(),
            modes: self.mode_table()?,
            camera: self.camera_control(),
            grabber,
            runner: plane.local(),
            dependents: self.dependency_set(plane)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use camstack_tmux::TmuxCommandRunner;
    use camstack_tmux::testing::FakeTmux;

    use crate::dependency::PlanStep;
    use crate::process::DependentProcess;

    const GLINT: &str = r#"
[camera]
name = "glint"
family = "glint"
unit = 1
mode = 12
base_config = "/home/scexao/src/camstack/config/cred2_14bit.cfg"
scheduling = { cset = "glint_edt", rtprio = 49 }

[timings]
taker_settle_ms = 2000

[[dependent]]
session = "glint_tcp"
command = "shmimTCPtransmit %s %s %u"
args = ["glint", "10.20.70.1", 30108]
kill_upon_create = true
start_order = 1
kill_order = 0

[[dependent]]
session = "glint_tcp"
command = "shmimTCPreceive -c ircam %u"
args = [30108]
remote_host = "scexao5"
start_order = 0
kill_order = 1
"#;

    struct FakePlane {
        local: Arc<FakeTmux>,
        remote: Arc<FakeTmux>,
    }

    impl ControlPlane for FakePlane {
        fn local(&self) -> Arc<dyn TmuxCommandRunner> {
            self.local.clone()
        }

        fn remote(&self, _host: &str) -> Arc<dyn TmuxCommandRunner> {
            self.remote.clone()
        }
    }

    #[test]
    fn parses_family_definition_with_defaults() {
        let def = CameraDefinition::from_toml(GLINT).expect("valid");
        assert_eq!(def.name(), "glint");
        assert_eq!(def.stream_name(), "glint");
        assert_eq!(def.initial_mode(), &ModeId::Index(12));
        assert_eq!(def.grabber, GrabberSection::default());
        assert_eq!(def.timings.taker_settle_ms, 2000);
        assert_eq!(def.timings.crop_settle_ms, 500);
        assert_eq!(def.dependents.len(), 2);
        assert!(def.dependents[0].kill_upon_create);
        assert_eq!(def.dependents[1].remote_host.as_deref(), Some("scexao5"));

        let acq = def.acquisition_config();
        assert_eq!(acq.unit, 1);
        assert_eq!(acq.taker_settle, Duration::from_secs(2));
        assert_eq!(acq.config_path(), PathBuf::from("/tmp/glint.cfg"));
    }

    #[test]
    fn same_session_name_on_two_hosts_is_fine() {
        let def = CameraDefinition::from_toml(GLINT).expect("valid");
        let plane = FakePlane {
            local: Arc::new(FakeTmux::new()),
            remote: Arc::new(FakeTmux::remote("scexao5")),
        };
        let (taker, deps) = def.sessions(&plane).expect("sessions");
        assert_eq!(taker.name(), "glint_edt");
        assert_eq!(deps.len(), 2);
        assert_eq!(
            deps.get(0).map(DependentProcess::command_line),
            Some("shmimTCPtransmit glint 10.20.70.1 30108")
        );
    }

    #[test]
    fn duplicate_local_session_rejected() {
        let doc = GLINT.replace("remote_host = \"scexao5\"\n", "");
        let err = CameraDefinition::from_toml(&doc).expect_err("duplicate");
        assert!(matches!(err, ConfigError::DuplicateSession(s) if s == "glint_tcp"));
    }

    #[test]
    fn dependent_may_not_take_the_taker_session() {
        let doc = GLINT.replacen("session = \"glint_tcp\"", "session = \"glint_edt\"", 1);
        let err = CameraDefinition::from_toml(&doc).expect_err("duplicate");
        assert!(matches!(err, ConfigError::DuplicateSession(s) if s == "glint_edt"));
    }

    #[test]
    fn mode_missing_from_family_table() {
        let doc = GLINT.replace("family = \"glint\"", "family = \"rajni\"");
        let err = CameraDefinition::from_toml(&doc).expect_err("unknown mode");
        assert!(matches!(err, ConfigError::UnknownMode(ModeId::Index(12))));
    }

    #[test]
    fn unknown_family_is_a_parse_error() {
        let doc = GLINT.replace("family = \"glint\"", "family = \"ocam\"");
        assert!(matches!(
            CameraDefinition::from_toml(&doc),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn bad_template_caught_at_load() {
        let doc = GLINT.replace("args = [30108]", "args = []");
        let err = CameraDefinition::from_toml(&doc).expect_err("template");
        assert!(matches!(err, ConfigError::Template { ref session, .. } if session == "glint_tcp"));
    }

    #[test]
    fn generic_family_reads_its_own_modes() {
        let doc = r#"
[camera]
name = "kcam"
family = "generic"
mode = 0
base_config = "/etc/kcam.cfg"
byte_pair_cast = true

[sensor]
width = 100
height = 100

[[mode]]
id = 0
x0 = 0
x1 = 99
y0 = 0
y1 = 99

[[mode]]
id = 1
x0 = 0
x1 = 49
y0 = 0
y1 = 49
fps = 200.0
"#;
        let def = CameraDefinition::from_toml(doc).expect("valid");
        let table = def.mode_table().expect("table");
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&ModeId::Index(1)).expect("1").fps, Some(200.0));
        assert!(def.camera_control().casts_byte_pairs());
    }

    #[test]
    fn generic_family_without_modes_rejected() {
        let doc = r#"
[camera]
name = "kcam"
family = "generic"
base_config = "/etc/kcam.cfg"
"#;
        assert!(matches!(
            CameraDefinition::from_toml(doc),
            Err(ConfigError::MissingModeTable)
        ));
    }

    #[test]
    fn load_reports_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("glint.toml");
        let err = CameraDefinition::load(&path).expect_err("absent");
        assert!(matches!(err, ConfigError::Read { path: ref p, .. } if *p == path));
        fs::write(&path, GLINT).expect("write");
        assert_eq!(CameraDefinition::load(&path).expect("load").name(), "glint");
    }

    #[test]
    fn tmux_section_selects_socket() {
        let doc = format!("{GLINT}\n[tmux]\nsocket_name = \"cams\"\n");
        let def = CameraDefinition::from_toml(&doc).expect("valid");
        assert_eq!(def.tmux.socket_name.as_deref(), Some("cams"));
        assert_eq!(def.tmux.bin, "tmux");
        assert_eq!(def.tmux.ssh_connect_timeout_s, 5);
        let doc = format!("{GLINT}\n[tmux]\nssh_connect_timeout_s = 2\n");
        let def = CameraDefinition::from_toml(&doc).expect("valid");
        assert_eq!(def.tmux.ssh_connect_timeout_s, 2);
    }

    #[test]
    fn unset_orders_stop_in_reverse_declaration() {
        let doc = r#"
[camera]
name = "rajni"
family = "rajni"
mode = 0
base_config = "/etc/cred2.cfg"

[[dependent]]
session = "rajni_tcp"
command = "shmimTCPtransmit rajni"

[[dependent]]
session = "rajni_fits"
command = "milk-logshim rajni"

[[dependent]]
session = "rajni_zmq"
command = "zmq_send rajni"
"#;
        let def = CameraDefinition::from_toml(doc).expect("valid");
        assert!(def.dependents.iter().all(|d| d.start_order == 0 && d.kill_order == 0));
        let plane = FakePlane {
            local: Arc::new(FakeTmux::new()),
            remote: Arc::new(FakeTmux::remote("scexao5")),
        };
        let deps = def.dependency_set(&plane).expect("set");
        assert_eq!(
            deps.start_plan(),
            vec![PlanStep::Start(0), PlanStep::Start(1), PlanStep::Start(2)]
        );
        assert_eq!(
            deps.stop_plan(),
            vec![PlanStep::Stop(2), PlanStep::Stop(1), PlanStep::Stop(0)]
        );
    }
}
