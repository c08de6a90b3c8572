//! Camera capability interfaces.
//!
//! `SerialLink` is the opaque command channel to camera firmware.
//! `CameraControl` is what a camera family plugs into the controller; every
//! hook has a no-op default, so a family only implements what it needs.

use std::fmt;
use std::str::FromStr;

use crate::error::CameraError;
use crate::keywords::StreamKeywords;
use crate::mode::{CameraMode, ModeId};

/// Operator-level camera requests: typed settings and read-backs a family
/// may support on a running camera.
#[derive(Debug, Clone, PartialEq)]
pub enum CameraRequest {
    Fps(Option<f64>),
    MaxFps,
    Tint(Option<f64>),
    MaxTint,
    /// Gain names are family-specific; the family parses them.
    Gain(Option<String>),
    Ndr(Option<u32>),
    Temperature,
    TemperatureSetpoint(f64),
    Synchro(bool),
}

impl CameraRequest {
    /// Words understood by [`CameraRequest::parse_words`].
    pub const WORDS: &'static [&'static str] = &[
        "fps", "maxfps", "tint", "maxtint", "gain", "ndr", "temp", "setpoint", "synchro",
    ];

    /// Parse `word rest`. `None` if `word` is not a camera request at all.
    pub fn parse_words(word: &str, rest: &str) -> Option<Result<Self, String>> {
        fn value<T: FromStr>(word: &str, rest: &str) -> Result<Option<T>, String> {
            if rest.is_empty() {
                return Ok(None);
            }
            rest.parse()
                .map(Some)
                .map_err(|_| format!("{word}: invalid value {rest:?}"))
        }
        fn bare(word: &str, rest: &str, req: CameraRequest) -> Result<CameraRequest, String> {
            if rest.is_empty() {
                Ok(req)
            } else {
                Err(format!("{word} takes no argument"))
            }
        }

        let parsed = match word {
            "fps" => value(word, rest).map(CameraRequest::Fps),
            "maxfps" => bare(word, rest, CameraRequest::MaxFps),
            "tint" => value(word, rest).map(CameraRequest::Tint),
            "maxtint" => bare(word, rest, CameraRequest::MaxTint),
            "gain" => Ok(CameraRequest::Gain((!rest.is_empty()).then(|| rest.to_string()))),
            "ndr" => value(word, rest).map(CameraRequest::Ndr),
            "temp" => bare(word, rest, CameraRequest::Temperature),
            "setpoint" => value(word, rest).and_then(|v| {
                v.map(CameraRequest::TemperatureSetpoint)
                    .ok_or_else(|| "usage: setpoint <celsius>".to_string())
            }),
            "synchro" => match rest {
                "on" => Ok(CameraRequest::Synchro(true)),
                "off" => Ok(CameraRequest::Synchro(false)),
                _ => Err("usage: synchro on|off".to_string()),
            },
            _ => return None,
        };
        Some(parsed)
    }
}

impl FromStr for CameraRequest {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(w, r)| (w, r.trim()));
        CameraRequest::parse_words(word, rest)
            .unwrap_or_else(|| Err(format!("unknown camera request {word:?}")))
    }
}

impl fmt::Display for CameraRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraRequest::Fps(None) => f.write_str("fps"),
            CameraRequest::Fps(Some(v)) => write!(f, "fps {v}"),
            CameraRequest::MaxFps => f.write_str("maxfps"),
            CameraRequest::Tint(None) => f.write_str("tint"),
            CameraRequest::Tint(Some(v)) => write!(f, "tint {v}"),
            CameraRequest::MaxTint => f.write_str("maxtint"),
            CameraRequest::Gain(None) => f.write_str("gain"),
            CameraRequest::Gain(Some(g)) => write!(f, "gain {g}"),
            CameraRequest::Ndr(None) => f.write_str("ndr"),
            CameraRequest::Ndr(Some(n)) => write!(f, "ndr {n}"),
            CameraRequest::Temperature => f.write_str("temp"),
            CameraRequest::TemperatureSetpoint(t) => write!(f, "setpoint {t}"),
            CameraRequest::Synchro(on) => write!(f, "synchro {}", if *on { "on" } else { "off" }),
        }
    }
}

/// Send one ASCII command, get the camera's reply.
pub trait SerialLink: Send {
    fn send(&mut self, command: &str) -> Result<String, CameraError>;
}

impl<T: SerialLink + ?Sized> SerialLink for Box<T> {
    fn send(&mut self, command: &str) -> Result<String, CameraError> {
        (**self).send(command)
    }
}

pub trait CameraControl: Send {
    /// Detector family name, recorded as the `DETECTOR` keyword.
    fn family(&self) -> &str;

    /// Whether the acquisition path packs byte pairs into 16-bit pixels,
    /// which doubles the frame-grabber width.
    fn casts_byte_pairs(&self) -> bool {
        false
    }

    /// One-time settings issued right after the serial link is opened.
    fn on_open(&mut self, _link: &mut dyn SerialLink) -> Result<(), CameraError> {
        Ok(())
    }

    /// Program the camera for `mode` (crop, windowing) before acquisition starts.
    fn prepare(
        &mut self,
        _link: &mut dyn SerialLink,
        _id: &ModeId,
        _mode: &CameraMode,
    ) -> Result<(), CameraError> {
        Ok(())
    }

    /// Apply the mode's frame rate / exposure once acquisition is running.
    fn finalize(
        &mut self,
        _link: &mut dyn SerialLink,
        _id: &ModeId,
        _mode: &CameraMode,
    ) -> Result<(), CameraError> {
        Ok(())
    }

    /// Read back camera state into the stream keywords.
    fn fill_keywords(
        &mut self,
        _link: &mut dyn SerialLink,
        _id: &ModeId,
        _mode: &CameraMode,
        _keywords: &mut StreamKeywords,
    ) -> Result<(), CameraError> {
        Ok(())
    }

    /// Serve an operator request on a running camera, updating the matching
    /// keywords. The reply is the value the camera reports afterwards.
    fn request(
        &mut self,
        _link: &mut dyn SerialLink,
        request: &CameraRequest,
        _keywords: &mut StreamKeywords,
    ) -> Result<String, CameraError> {
        Err(CameraError::Unsupported {
            family: self.family().to_string(),
            request: request.to_string(),
        })
    }
}

/// A camera with no serial programming at all; the grabber config alone
/// defines the frame.
#[derive(Debug, Clone, Default)]
pub struct GenericCamera {
    cast: bool,
}

impl GenericCamera {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_byte_pair_cast(mut self, cast: bool) -> Self {
        self.cast = cast;
        self
    }
}

impl CameraControl for GenericCamera {
    fn family(&self) -> &str {
        "generic"
    }

    fn casts_byte_pairs(&self) -> bool {
        self.cast
    }
}
