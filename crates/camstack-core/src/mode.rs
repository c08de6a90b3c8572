//! Camera modes: sensor crop windows with optional rate/exposure defaults,
//! collected in an immutable, validated table per camera family.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Key into a [`ModeTable`]: either a numbered mode or a named one (`full`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModeId {
    Index(u32),
    Named(String),
}

impl ModeId {
    /// The uncropped full-frame mode.
    pub fn full() -> Self {
        ModeId::Named("full".to_string())
    }

    pub fn is_full(&self) -> bool {
        matches!(self, ModeId::Named(n) if n == "full")
    }
}

impl fmt::Display for ModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeId::Index(i) => write!(f, "{i}"),
            ModeId::Named(n) => f.write_str(n),
        }
    }
}

impl FromStr for ModeId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<u32>() {
            Ok(i) => ModeId::Index(i),
            Err(_) => ModeId::Named(s.to_string()),
        })
    }
}

impl From<u32> for ModeId {
    fn from(i: u32) -> Self {
        ModeId::Index(i)
    }
}

impl From<&str> for ModeId {
    fn from(s: &str) -> Self {
        ModeId::Named(s.to_string())
    }
}

/// Inclusive sensor crop bounds: columns `x0..=x1`, rows `y0..=y1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropWindow {
    pub x0: u32,
    pub x1: u32,
    pub y0: u32,
    pub y1: u32,
}

impl CropWindow {
    pub const fn new(x0: u32, x1: u32, y0: u32, y1: u32) -> Self {
        Self { x0, x1, y0, y1 }
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0 + 1
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0 + 1
    }

    fn is_ordered(&self) -> bool {
        self.x0 <= self.x1 && self.y0 <= self.y1
    }
}

impl fmt::Display for CropWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} {}-{}", self.x0, self.x1, self.y0, self.y1)
    }
}

/// One entry of a mode table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraMode {
    #[serde(flatten)]
    pub window: CropWindow,
    /// Target frame rate in Hz; `None` keeps whatever the camera runs at.
    #[serde(default)]
    pub fps: Option<f64>,
    /// Target exposure time in seconds.
    #[serde(default)]
    pub tint: Option<f64>,
}

impl CameraMode {
    pub const fn new(window: CropWindow) -> Self {
        Self {
            window,
            fps: None,
            tint: None,
        }
    }

    #[must_use]
    pub const fn with_timing(mut self, fps: f64, tint: f64) -> Self {
        self.fps = Some(fps);
        self.tint = Some(tint);
        self
    }

    /// The same mode moved `dx` columns (negative = left). `None` if the
    /// window would leave the non-negative range.
    pub fn shift_columns(&self, dx: i64) -> Option<Self> {
        let x0 = u32::try_from(i64::from(self.window.x0) + dx).ok()?;
        let x1 = u32::try_from(i64::from(self.window.x1) + dx).ok()?;
        Some(Self {
            window: CropWindow { x0, x1, ..self.window },
            ..*self
        })
    }

    pub fn width(&self) -> u32 {
        self.window.width()
    }

    pub fn height(&self) -> u32 {
        self.window.height()
    }
}

/// Full-frame extent of the physical sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorExtent {
    pub width: u32,
    pub height: u32,
}

impl SensorExtent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The window covering the whole sensor.
    pub fn full_window(&self) -> CropWindow {
        CropWindow::new(0, self.width - 1, 0, self.height - 1)
    }

    fn contains(&self, w: &CropWindow) -> bool {
        w.x1 < self.width && w.y1 < self.height
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModeError {
    #[error("unknown mode {0}")]
    UnknownMode(ModeId),

    #[error("mode {id}: window {window} is not ordered (x0 <= x1, y0 <= y1)")]
    Unordered { id: ModeId, window: CropWindow },

    #[error("mode {id}: window {window} exceeds the {}x{} sensor", .sensor.width, .sensor.height)]
    OutOfBounds {
        id: ModeId,
        window: CropWindow,
        sensor: SensorExtent,
    },

    #[error("mode {0} is defined twice")]
    Duplicate(ModeId),

    #[error("mode {0} cannot be derived: shifted window leaves the sensor")]
    Underivable(ModeId),
}

/// Immutable mapping mode id -> mode, every window checked against the sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeTable {
    sensor: SensorExtent,
    modes: BTreeMap<ModeId, CameraMode>,
}

impl ModeTable {
    pub fn new(
        sensor: SensorExtent,
        entries: impl IntoIterator<Item = (ModeId, CameraMode)>,
    ) -> Result<Self, ModeError> {
        let mut modes = BTreeMap::new();
        for (id, mode) in entries {
            if !mode.window.is_ordered() {
                return Err(ModeError::Unordered {
                    id,
                    window: mode.window,
                });
            }
            if !sensor.contains(&mode.window) {
                return Err(ModeError::OutOfBounds {
                    id,
                    window: mode.window,
                    sensor,
                });
            }
            if modes.contains_key(&id) {
                return Err(ModeError::Duplicate(id));
            }
            modes.insert(id, mode);
        }
        Ok(Self { sensor, modes })
    }

    pub fn sensor(&self) -> SensorExtent {
        self.sensor
    }

    pub fn get(&self, id: &ModeId) -> Result<&CameraMode, ModeError> {
        self.modes
            .get(id)
            .ok_or_else(|| ModeError::UnknownMode(id.clone()))
    }

    pub fn contains(&self, id: &ModeId) -> bool {
        self.modes.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ModeId, &CameraMode)> {
        self.modes.iter()
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }
}
