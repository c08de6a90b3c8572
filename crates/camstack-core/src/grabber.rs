//! Frame-grabber boundary: config file generation and the EDT PDV tools.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::camera::SerialLink;
use crate::error::{CameraError, CamstackError};
use crate::mode::CameraMode;

/// Programs the frame grabber and hands out the camera's serial link.
pub trait FrameGrabber: Send {
    /// Load `cfg_path` into grabber `unit`/`channel`. Any rejection is fatal.
    fn configure(&mut self, cfg_path: &Path, unit: u32, channel: u32) -> Result<(), CamstackError>;

    fn open_serial(&mut self, unit: u32, channel: u32) -> Result<Box<dyn SerialLink>, CamstackError>;
}

/// Frame geometry as the grabber sees it.
///
/// With byte-pair casting the grabber reads two bytes per pixel, so its
/// width is twice the image width. The width and the taker's `-8` flag both
/// come from `cast` and are never set independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrabberLayout {
    pub width: u32,
    pub height: u32,
    pub cast: bool,
}

impl GrabberLayout {
    pub fn for_mode(mode: &CameraMode, cast: bool) -> Self {
        Self {
            width: mode.width(),
            height: mode.height(),
            cast,
        }
    }

    pub fn grabber_width(&self) -> u32 {
        if self.cast { 2 * self.width } else { self.width }
    }
}

/// Copy `template` to `out` and append the frame geometry.
pub fn write_config_file(
    template: &Path,
    out: &Path,
    layout: &GrabberLayout,
) -> Result<(), CamstackError> {
    let mut body = match fs::read_to_string(template) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(CamstackError::ResourceMissing(template.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    if !body.is_empty() && !body.ends_with('\n') {
        body.push('\n');
    }
    if let Some(dir) = out.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut file = fs::File::create(out)?;
    file.write_all(body.as_bytes())?;
    writeln!(file, "width: {}", layout.grabber_width())?;
    writeln!(file, "height: {}", layout.height)?;
    tracing::debug!(path = %out.display(), width = layout.grabber_width(), height = layout.height, "grabber config written");
    Ok(())
}

// ─── EDT ────────────────────────────────────────────────────────

/// EDT PDV tools: `initcam` loads a config, `serial_cmd` talks to the camera.
#[derive(Debug, Clone)]
pub struct EdtGrabber {
    initcam: PathBuf,
    serial_cmd: PathBuf,
}

impl EdtGrabber {
    pub fn new(initcam: impl Into<PathBuf>, serial_cmd: impl Into<PathBuf>) -> Self {
        Self {
            initcam: initcam.into(),
            serial_cmd: serial_cmd.into(),
        }
    }
}

impl Default for EdtGrabber {
    fn default() -> Self {
        Self::new("/opt/EDTpdv/initcam", "/opt/EDTpdv/serial_cmd")
    }
}

impl FrameGrabber for EdtGrabber {
    fn configure(&mut self, cfg_path: &Path, unit: u32, channel: u32) -> Result<(), CamstackError> {
        tracing::info!(cfg = %cfg_path.display(), unit, channel, "initcam");
        let output = Command::new(&self.initcam)
            .arg("-u")
            .arg(unit.to_string())
            .arg("-c")
            .arg(channel.to_string())
            .arg("-f")
            .arg(cfg_path)
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => CamstackError::ResourceMissing(self.initcam.clone()),
                _ => CamstackError::Io(e),
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CamstackError::ConfigurationRejected(format!(
                "initcam exited with {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn open_serial(&mut self, unit: u32, channel: u32) -> Result<Box<dyn SerialLink>, CamstackError> {
        if !self.serial_cmd.exists() && self.serial_cmd.is_absolute() {
            return Err(CamstackError::ResourceMissing(self.serial_cmd.clone()));
        }
        Ok(Box::new(EdtSerialLink {
            serial_cmd: self.serial_cmd.clone(),
            unit,
            channel,
        }))
    }
}

/// One `serial_cmd` invocation per command.
#[derive(Debug, Clone)]
pub struct EdtSerialLink {
    serial_cmd: PathBuf,
    unit: u32,
    channel: u32,
}

impl SerialLink for EdtSerialLink {
    fn send(&mut self, command: &str) -> Result<String, CameraError> {
        let output = Command::new(&self.serial_cmd)
            .arg("-u")
            .arg(self.unit.to_string())
            .arg("-c")
            .arg(self.channel.to_string())
            .arg(command)
            .output()
            .map_err(|e| CameraError::Link(format!("{}: {e}", self.serial_cmd.display())))?;
        if !output.status.success() {
            return Err(CameraError::Link(format!(
                "{} exited with {}",
                self.serial_cmd.display(),
                output.status.code().unwrap_or(-1)
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
