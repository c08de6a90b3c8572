//! Acquisition controller: one camera, its frame-grabber taker process and
//! the dependency set hanging off the taker's stream.
//!
//! ```text
//! Uninitialized --configure--> Configured --start--> Running
//!                                                    |    ^
//!                                         change_mode|    |
//!                                                    v    |
//!                                               Reconfiguring
//! any --close--> Closed        any failure --> Indeterminate
//! ```
//!
//! Every operation is synchronous and runs on the caller's thread. A failed
//! transition leaves the controller `Indeterminate`; from there only a full
//! `configure`, `change_mode` or `close` is accepted.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use camstack_tmux::{SessionHandle, TmuxCommandRunner};
use chrono::Utc;
use serde::Serialize;

use crate::audit::{SessionAudit, audit_sessions};
use crate::camera::{CameraControl, CameraRequest, SerialLink};
use crate::dependency::{DependencySet, session_key};
use crate::error::CamstackError;
use crate::grabber::{FrameGrabber, GrabberLayout, write_config_file};
use crate::keywords::StreamKeywords;
use crate::mode::{CameraMode, ModeId, ModeTable};
use crate::process::SchedulingTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Uninitialized,
    Configured,
    Running,
    Reconfiguring,
    /// A transition failed midway; neither the old nor the new mode is
    /// guaranteed.
    Indeterminate,
    Closed,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ControllerState::Uninitialized => "uninitialized",
            ControllerState::Configured => "configured",
            ControllerState::Running => "running",
            ControllerState::Reconfiguring => "reconfiguring",
            ControllerState::Indeterminate => "indeterminate",
            ControllerState::Closed => "closed",
        })
    }
}

/// Static acquisition settings for one camera.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionConfig {
    /// Camera name; prefixes every session this camera owns.
    pub name: String,
    /// Shared-memory stream the taker writes.
    pub stream_name: String,
    pub unit: u32,
    pub channel: u32,
    /// Family config template for the grabber.
    pub base_config: PathBuf,
    /// Where `<name>.cfg` is written.
    pub config_dir: PathBuf,
    pub edttake: PathBuf,
    pub scheduling: Option<SchedulingTag>,
    /// Wait after launching the taker before anything depends on it.
    pub taker_settle: Duration,
    pub kill_grace: Duration,
}

impl AcquisitionConfig {
    pub fn new(
        name: impl Into<String>,
        stream_name: impl Into<String>,
        base_config: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            stream_name: stream_name.into(),
            unit: 0,
            channel: 0,
            base_config: base_config.into(),
            config_dir: PathBuf::from("/tmp"),
            edttake: PathBuf::from("edttake"),
            scheduling: None,
            taker_settle: Duration::from_secs(1),
            kill_grace: Duration::ZERO,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(format!("{}.cfg", self.name))
    }

    pub fn taker_session_name(&self) -> String {
        format!("{}_edt", self.name)
    }

    /// Command line typed into the taker session.
    pub fn taker_command(&self, layout: &GrabberLayout) -> String {
        let mut cmd = format!(
            "{} -s {} -u {} -c {} -l 0 -N 4",
            self.edttake.display(),
            self.stream_name,
            self.unit,
            self.channel
        );
        if layout.cast {
            cmd.push_str(" -8");
        }
        match &self.scheduling {
            Some(tag) => tag.wrap(&cmd),
            None => cmd,
        }
    }
}

/// Everything a controller is assembled from.
pub struct ControllerParts {
    pub config: AcquisitionConfig,
    pub modes: ModeTable,
    pub camera: Box<dyn CameraControl>,
    pub grabber: Box<dyn FrameGrabber>,
    /// Local control plane hosting the taker session.
    pub runner: Arc<dyn TmuxCommandRunner>,
    pub dependents: DependencySet,
}

/// Snapshot for `status` output.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub name: String,
    pub stream: String,
    pub state: ControllerState,
    pub mode: Option<ModeId>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub keywords: StreamKeywords,
}

/// Stop the dependents, then the taker. Safe to repeat.
pub fn teardown(
    dependents: &mut DependencySet,
    taker: &mut SessionHandle,
) -> Result<(), CamstackError> {
    dependents.stop_all()?;
    taker.kill()?;
    Ok(())
}

pub struct AcquisitionController {
    config: AcquisitionConfig,
    modes: ModeTable,
    camera: Box<dyn CameraControl>,
    grabber: Box<dyn FrameGrabber>,
    link: Option<Box<dyn SerialLink>>,
    taker: SessionHandle,
    dependents: DependencySet,
    state: ControllerState,
    current_mode: Option<ModeId>,
    keywords: StreamKeywords,
}

impl fmt::Debug for AcquisitionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquisitionController")
            .field("name", &self.config.name)
            .field("family", &self.camera.family())
            .field("state", &self.state)
            .field("current_mode", &self.current_mode)
            .field("dependents", &self.dependents.len())
            .finish()
    }
}

impl AcquisitionController {
    /// Assemble a controller. Nothing is touched until [`Self::configure`].
    pub fn new(parts: ControllerParts) -> Result<Self, CamstackError> {
        let taker_name = parts.config.taker_session_name();
        let taker_key = session_key(None, &taker_name);
        if parts.dependents.session_keys().any(|k| k == taker_key) {
            return Err(CamstackError::DuplicateSession(taker_key));
        }
        let taker = SessionHandle::new(taker_name, parts.runner)
            .with_kill_grace(parts.config.kill_grace);
        let keywords = StreamKeywords::new(parts.config.stream_name.clone());
        Ok(Self {
            config: parts.config,
            modes: parts.modes,
            camera: parts.camera,
            grabber: parts.grabber,
            link: None,
            taker,
            dependents: parts.dependents,
            state: ControllerState::Uninitialized,
            current_mode: None,
            keywords,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn current_mode_id(&self) -> Option<&ModeId> {
        self.current_mode.as_ref()
    }

    pub fn current_mode(&self) -> Option<&CameraMode> {
        self.current_mode
            .as_ref()
            .and_then(|id| self.modes.get(id).ok())
    }

    pub fn modes(&self) -> &ModeTable {
        &self.modes
    }

    pub fn dependents(&self) -> &DependencySet {
        &self.dependents
    }

    pub fn taker_session(&self) -> &SessionHandle {
        &self.taker
    }

    pub fn keywords(&self) -> &StreamKeywords {
        &self.keywords
    }

    pub fn status(&self) -> ControllerStatus {
        let mode = self.current_mode();
        ControllerStatus {
            name: self.config.name.clone(),
            stream: self.config.stream_name.clone(),
            state: self.state,
            mode: self.current_mode.clone(),
            width: mode.map(CameraMode::width),
            height: mode.map(CameraMode::height),
            keywords: self.keywords.clone(),
        }
    }

    fn require(&self, action: &'static str, allowed: &[ControllerState]) -> Result<(), CamstackError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(CamstackError::InvalidTransition {
                action,
                state: self.state,
            })
        }
    }

    /// Run a transition; any failure leaves the controller indeterminate.
    fn guarded<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, CamstackError>,
    ) -> Result<T, CamstackError> {
        let result = f(self);
        if let Err(e) = &result {
            tracing::error!(camera = %self.config.name, "transition failed: {e}");
            self.state = ControllerState::Indeterminate;
        }
        result
    }

    /// Tear down anything left over, then program grabber and camera for
    /// `mode_id`. Does not start acquisition.
    pub fn configure(&mut self, mode_id: ModeId) -> Result<(), CamstackError> {
        self.require(
            "configure",
            &[
                ControllerState::Uninitialized,
                ControllerState::Configured,
                ControllerState::Indeterminate,
            ],
        )?;
        self.modes.get(&mode_id)?;
        tracing::info!(camera = %self.config.name, mode = %mode_id, "configuring");
        self.guarded(|c| {
            c.stop_acquisition()?;
            c.reconfigure(mode_id)?;
            c.state = ControllerState::Configured;
            Ok(())
        })
    }

    /// Launch the taker, then the dependents, then read back camera state.
    pub fn start(&mut self) -> Result<(), CamstackError> {
        self.require("start", &[ControllerState::Configured])?;
        self.guarded(|c| {
            c.start_acquisition()?;
            c.state = ControllerState::Running;
            Ok(())
        })
    }

    /// Full stop, reconfigure and start under `mode_id`. There is no partial
    /// update path.
    pub fn change_mode(&mut self, mode_id: ModeId) -> Result<(), CamstackError> {
        self.require(
            "change mode",
            &[ControllerState::Running, ControllerState::Indeterminate],
        )?;
        self.modes.get(&mode_id)?;
        tracing::info!(
            camera = %self.config.name,
            from = ?self.current_mode.as_ref().map(ToString::to_string),
            to = %mode_id,
            "changing mode"
        );
        self.state = ControllerState::Reconfiguring;
        self.guarded(|c| {
            c.stop_acquisition()?;
            c.reconfigure(mode_id)?;
            c.start_acquisition()?;
            c.state = ControllerState::Running;
            Ok(())
        })
    }

    /// Replay the current mode.
    pub fn restart(&mut self) -> Result<(), CamstackError> {
        let mode_id = self.current_mode.clone().ok_or(CamstackError::InvalidTransition {
            action: "restart",
            state: self.state,
        })?;
        self.change_mode(mode_id)
    }

    /// Stop dependents and taker, drop the serial link. Closing a closed
    /// controller does nothing.
    pub fn close(&mut self) -> Result<(), CamstackError> {
        if self.state == ControllerState::Closed {
            return Ok(());
        }
        tracing::info!(camera = %self.config.name, "closing");
        self.guarded(|c| {
            c.stop_acquisition()?;
            c.link = None;
            c.state = ControllerState::Closed;
            Ok(())
        })
    }

    /// Send a raw serial command and return the reply.
    pub fn send_raw(&mut self, command: &str) -> Result<String, CamstackError> {
        let link = self
            .link
            .as_mut()
            .ok_or(CamstackError::InvalidTransition {
                action: "send a serial command",
                state: self.state,
            })?;
        Ok(link.send(command)?)
    }

    /// Pass a typed request to the camera family. The keywords it touches
    /// are updated in place.
    pub fn camera_request(&mut self, request: &CameraRequest) -> Result<String, CamstackError> {
        let link = self
            .link
            .as_mut()
            .ok_or(CamstackError::InvalidTransition {
                action: "query the camera",
                state: self.state,
            })?;
        tracing::info!(camera = %self.config.name, %request, "camera request");
        let reply = self.camera.request(link.as_mut(), request, &mut self.keywords)?;
        self.keywords.touch(Utc::now());
        Ok(reply)
    }

    pub fn audit(&self) -> Result<SessionAudit, CamstackError> {
        audit_sessions(&self.config.name, &self.taker, &self.dependents)
    }

    /// Re-read camera state into the stream keywords.
    pub fn refresh_keywords(&mut self) -> Result<(), CamstackError> {
        let (Some(id), Some(link)) = (self.current_mode.as_ref(), self.link.as_mut()) else {
            return Ok(());
        };
        let mode = self.modes.get(id)?;
        self.keywords.clear();
        self.keywords.set("DETECTOR", self.camera.family());
        self.camera
            .fill_keywords(link.as_mut(), id, mode, &mut self.keywords)?;
        self.keywords.touch(Utc::now());
        Ok(())
    }

    fn layout(&self, mode: &CameraMode) -> GrabberLayout {
        GrabberLayout::for_mode(mode, self.camera.casts_byte_pairs())
    }

    fn stop_acquisition(&mut self) -> Result<(), CamstackError> {
        teardown(&mut self.dependents, &mut self.taker)
    }

    /// Grabber config, serial link, camera prepare. The taker must be down.
    fn reconfigure(&mut self, mode_id: ModeId) -> Result<(), CamstackError> {
        if self.taker.is_process_alive()? {
            return Err(CamstackError::AcquisitionRunning(self.taker.name().to_string()));
        }
        let mode = *self.modes.get(&mode_id)?;
        let layout = self.layout(&mode);
        let cfg_path = self.config.config_path();
        write_config_file(&self.config.base_config, &cfg_path, &layout)?;
        self.grabber
            .configure(&cfg_path, self.config.unit, self.config.channel)?;

        if self.link.is_none() {
            let mut link = self.grabber.open_serial(self.config.unit, self.config.channel)?;
            self.camera.on_open(link.as_mut())?;
            self.link = Some(link);
        }
        if let Some(link) = self.link.as_mut() {
            self.camera.prepare(link.as_mut(), &mode_id, &mode)?;
        }
        self.current_mode = Some(mode_id);
        Ok(())
    }

    fn start_acquisition(&mut self) -> Result<(), CamstackError> {
        let Some(mode_id) = self.current_mode.clone() else {
            return Err(CamstackError::InvalidTransition {
                action: "start",
                state: self.state,
            });
        };
        let mode = *self.modes.get(&mode_id)?;
        let command = self.config.taker_command(&self.layout(&mode));
        tracing::info!(camera = %self.config.name, session = %self.taker.name(), "starting taker");
        self.taker.find_or_create()?;
        self.taker.send_command(&command)?;
        if !self.config.taker_settle.is_zero() {
            std::thread::sleep(self.config.taker_settle);
        }
        if !self.taker.is_process_alive()? {
            tracing::warn!(
                camera = %self.config.name,
                session = %self.taker.name(),
                "taker not alive after settle delay"
            );
        }

        if let Some(link) = self.link.as_mut() {
            self.camera.finalize(link.as_mut(), &mode_id, &mode)?;
        }
        self.dependents.start_all()?;
        self.refresh_keywords()
    }
}
