//! Shared doubles for controller integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use camstack_core::{CameraError, CamstackError, ControlPlane, CropWindow, FrameGrabber, SerialLink};
use camstack_tmux::TmuxCommandRunner;
use camstack_tmux::testing::{FakeTmux, TmuxCall};

pub struct FakePlane {
    pub local: Arc<FakeTmux>,
    pub remote: Arc<FakeTmux>,
}

impl FakePlane {
    pub fn new() -> Self {
        Self {
            local: Arc::new(FakeTmux::new()),
            remote: Arc::new(FakeTmux::remote("scexao5")),
        }
    }
}

impl ControlPlane for FakePlane {
    fn local(&self) -> Arc<dyn TmuxCommandRunner> {
        self.local.clone()
    }

    fn remote(&self, _host: &str) -> Arc<dyn TmuxCommandRunner> {
        self.remote.clone()
    }
}

/// `start <session>` / `stop <session>` for every command entered and every
/// session killed, in order.
pub fn lifecycle(fake: &FakeTmux) -> Vec<String> {
    fake.events()
        .into_iter()
        .filter_map(|c| match c {
            TmuxCall::SendCommand { session, .. } => Some(format!("start {session}")),
            TmuxCall::KillSession(session) => Some(format!("stop {session}")),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct GrabberLog {
    /// Contents of every config file handed to `configure`.
    pub configs: Vec<String>,
    pub serial_opens: usize,
    pub reject: bool,
}

/// Frame grabber that records configs and hands out a shared serial link.
pub struct RecordingGrabber {
    pub log: Arc<Mutex<GrabberLog>>,
    pub link: SharedLink,
}

impl FrameGrabber for RecordingGrabber {
    fn configure(&mut self, cfg_path: &Path, _unit: u32, _channel: u32) -> Result<(), CamstackError> {
        let mut log = self.log.lock().expect("lock");
        if log.reject {
            return Err(CamstackError::ConfigurationRejected("initcam: bad width".to_string()));
        }
        log.configs.push(fs::read_to_string(cfg_path)?);
        Ok(())
    }

    fn open_serial(&mut self, _unit: u32, _channel: u32) -> Result<Box<dyn SerialLink>, CamstackError> {
        self.log.lock().expect("lock").serial_opens += 1;
        Ok(Box::new(self.link.clone()))
    }
}

#[derive(Debug, Default)]
pub struct Cred2State {
    /// When set, `cropping raw` reports this whatever was requested.
    pub stuck_crop: Option<CropWindow>,
    pub crop: Option<CropWindow>,
    pub pending_cols: Option<(u32, u32)>,
    pub pending_rows: Option<(u32, u32)>,
    pub sent: Vec<String>,
    pub queued: VecDeque<String>,
}

/// Simulated CRED2 firmware behind a cloneable handle.
#[derive(Debug, Clone, Default)]
pub struct SharedLink(pub Arc<Mutex<Cred2State>>);

impl SharedLink {
    pub fn stuck_at(crop: CropWindow) -> Self {
        let link = Self::default();
        link.0.lock().expect("lock").stuck_crop = Some(crop);
        link
    }

    pub fn sent(&self) -> Vec<String> {
        self.0.lock().expect("lock").sent.clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.sent().iter().filter(|s| s.as_str() == command).count()
    }
}

fn range(s: &str) -> Option<(u32, u32)> {
    let (a, b) = s.split_once('-')?;
    Some((a.parse().ok()?, b.parse().ok()?))
}

impl SerialLink for SharedLink {
    fn send(&mut self, command: &str) -> Result<String, CameraError> {
        let mut st = self.0.lock().expect("lock");
        st.sent.push(command.to_string());
        if let Some(reply) = st.queued.pop_front() {
            return Ok(reply);
        }
        let full = CropWindow::new(0, 639, 0, 511);
        if let Some(r) = command.strip_prefix("set cropping columns ") {
            st.pending_cols = range(r);
        } else if let Some(r) = command.strip_prefix("set cropping rows ") {
            st.pending_rows = range(r);
        }
        if let (Some((x0, x1)), Some((y0, y1))) = (st.pending_cols, st.pending_rows) {
            st.crop = Some(CropWindow::new(x0, x1, y0, y1));
        }
        let reply = match command {
            "set cropping off" => {
                st.crop = Some(full);
                st.pending_cols = Some((0, 639));
                st.pending_rows = Some((0, 511));
                String::new()
            }
            "cropping raw" => {
                let c = st.stuck_crop.or(st.crop).unwrap_or(full);
                format!("on:{}-{}:{}-{}\r\nfli-cli>", c.x0, c.x1, c.y0, c.y1)
            }
            "extsynchro raw" => "off".to_string(),
            "sensibility raw" => "high".to_string(),
            "nbreadworeset raw" => "1".to_string(),
            "fps raw" => "1394.8".to_string(),
            "tint raw" => "0.0007".to_string(),
            "temp snake raw" => "-39.9".to_string(),
            "temp snake setpoint raw" => "-40.0".to_string(),
            _ => String::new(),
        };
        Ok(reply)
    }
}
