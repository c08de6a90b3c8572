//! First Light CRED2 family (Rajni, GLINT, Chuck): typed serial commands,
//! reply parsing, crop check-and-set, and the family mode tables.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::camera::{CameraControl, CameraRequest, SerialLink};
use crate::error::CameraError;
use crate::keywords::StreamKeywords;
use crate::mode::{CameraMode, CropWindow, ModeError, ModeId, ModeTable, SensorExtent};

/// Full CRED2 sensor.
pub const CRED2_SENSOR: SensorExtent = SensorExtent::new(640, 512);

/// Crop changes are not always accepted on the first try.
pub const CROP_ATTEMPTS: u32 = 3;

const CELSIUS_TO_KELVIN: f64 = 273.15;

// ─── Commands ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gain {
    Low,
    Medium,
    High,
}

impl fmt::Display for Gain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Gain::Low => "low",
            Gain::Medium => "medium",
            Gain::High => "high",
        })
    }
}

impl FromStr for Gain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "low" | "0" => Ok(Gain::Low),
            "medium" | "1" => Ok(Gain::Medium),
            "high" | "2" => Ok(Gain::High),
            other => Err(format!("unknown gain {other:?}")),
        }
    }
}

/// Requests understood by CRED2 firmware.
#[derive(Debug, Clone, PartialEq)]
pub enum Cred2Command {
    SetFanManual,
    SetFanSpeed(u32),
    SetLed(bool),
    SetCropping(bool),
    GetCropping,
    SetCropColumns(u32, u32),
    SetCropRows(u32, u32),
    SetExtSynchro(bool),
    GetExtSynchro,
    SetGain(Gain),
    GetGain,
    SetNdr(u32),
    GetNdr,
    SetFps(f64),
    GetFps,
    GetMaxFps,
    SetTint(f64),
    GetTint,
    GetMaxTint,
    GetTemperature,
    SetTemperatureSetpoint(f64),
    GetTemperatureSetpoint,
}

fn on_off(v: bool) -> &'static str {
    if v { "on" } else { "off" }
}

impl Cred2Command {
    /// ASCII wire form.
    pub fn wire(&self) -> String {
        match self {
            Cred2Command::SetFanManual => "set fan mode manual".to_string(),
            Cred2Command::SetFanSpeed(s) => format!("set fan speed {s}"),
            Cred2Command::SetLed(on) => format!("set led {}", on_off(*on)),
            Cred2Command::SetCropping(on) => format!("set cropping {}", on_off(*on)),
            Cred2Command::GetCropping => "cropping raw".to_string(),
            Cred2Command::SetCropColumns(a, b) => format!("set cropping columns {a}-{b}"),
            Cred2Command::SetCropRows(a, b) => format!("set cropping rows {a}-{b}"),
            Cred2Command::SetExtSynchro(on) => format!("set extsynchro {}", on_off(*on)),
            Cred2Command::GetExtSynchro => "extsynchro raw".to_string(),
            Cred2Command::SetGain(g) => format!("set sensibility {g}"),
            Cred2Command::GetGain => "sensibility raw".to_string(),
            Cred2Command::SetNdr(n) => format!("set nbreadworeset {n}"),
            Cred2Command::GetNdr => "nbreadworeset raw".to_string(),
            Cred2Command::SetFps(v) => format!("set fps {v}"),
            Cred2Command::GetFps => "fps raw".to_string(),
            Cred2Command::GetMaxFps => "maxfps raw".to_string(),
            Cred2Command::SetTint(v) => format!("set tint {v}"),
            Cred2Command::GetTint => "tint raw".to_string(),
            Cred2Command::GetMaxTint => "maxtint raw".to_string(),
            Cred2Command::GetTemperature => "temp snake raw".to_string(),
            Cred2Command::SetTemperatureSetpoint(t) => format!("set temp snake {t:.1}"),
            Cred2Command::GetTemperatureSetpoint => "temp snake setpoint raw".to_string(),
        }
    }
}

// ─── Replies ────────────────────────────────────────────────────

/// Strip the CLI prompt and whitespace; turn error tokens into `Rejected`.
pub fn check_reply(command: &str, reply: &str) -> Result<String, CameraError> {
    let body = reply.trim().trim_end_matches("fli-cli>").trim();
    let lower = body.to_ascii_lowercase();
    if lower.starts_with("error") || lower.starts_with("err:") || lower.contains("command not found") {
        return Err(CameraError::Rejected {
            command: command.to_string(),
            reply: body.to_string(),
        });
    }
    Ok(body.to_string())
}

fn bad_reply(command: &str, reply: &str) -> CameraError {
    CameraError::BadReply {
        command: command.to_string(),
        reply: reply.to_string(),
    }
}

fn parse_value<T: FromStr>(command: &str, reply: &str) -> Result<T, CameraError> {
    reply.trim().parse().map_err(|_| bad_reply(command, reply))
}

fn parse_range(command: &str, reply: &str, field: &str) -> Result<(u32, u32), CameraError> {
    let (a, b) = field
        .trim()
        .split_once('-')
        .ok_or_else(|| bad_reply(command, reply))?;
    Ok((parse_value(command, a)?, parse_value(command, b)?))
}

/// `cropping raw` answers `<state>:<x0>-<x1>:<y0>-<y1>`.
pub fn parse_crop(command: &str, reply: &str) -> Result<CropWindow, CameraError> {
    let fields: Vec<&str> = reply.trim().split(':').collect();
    if fields.len() < 2 {
        return Err(bad_reply(command, reply));
    }
    let (x0, x1) = parse_range(command, reply, fields[fields.len() - 2])?;
    let (y0, y1) = parse_range(command, reply, fields[fields.len() - 1])?;
    Ok(CropWindow::new(x0, x1, y0, y1))
}

fn parse_on_off(command: &str, reply: &str) -> Result<bool, CameraError> {
    match reply.trim() {
        "on" => Ok(true),
        "off" => Ok(false),
        _ => Err(bad_reply(command, reply)),
    }
}

// ─── Camera ─────────────────────────────────────────────────────

/// CRED2 camera control. `model` names the physical unit (`rajni`, `glint`,
/// `chuck`); all of them speak the same protocol.
#[derive(Debug, Clone)]
pub struct Cred2 {
    model: String,
    synchro: bool,
    ndr: Option<u32>,
    crop_settle: Duration,
    gain_on_open: Gain,
    temperature_setpoint: f64,
}

impl Cred2 {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            synchro: false,
            ndr: None,
            crop_settle: Duration::from_millis(500),
            gain_on_open: Gain::High,
            temperature_setpoint: -40.0,
        }
    }

    #[must_use]
    pub fn with_crop_settle(mut self, settle: Duration) -> Self {
        self.crop_settle = settle;
        self
    }

    #[must_use]
    pub fn with_synchro(mut self, synchro: bool) -> Self {
        self.synchro = synchro;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn query(&self, link: &mut dyn SerialLink, cmd: &Cred2Command) -> Result<String, CameraError> {
        let wire = cmd.wire();
        let reply = link.send(&wire)?;
        tracing::debug!(camera = %self.model, "{wire} -> {}", reply.trim());
        check_reply(&wire, &reply)
    }

    fn query_value<T: FromStr>(
        &self,
        link: &mut dyn SerialLink,
        cmd: &Cred2Command,
    ) -> Result<T, CameraError> {
        let reply = self.query(link, cmd)?;
        parse_value(&cmd.wire(), &reply)
    }

    fn settle(&self) {
        if !self.crop_settle.is_zero() {
            std::thread::sleep(self.crop_settle);
        }
    }

    pub fn get_cropping(&self, link: &mut dyn SerialLink) -> Result<CropWindow, CameraError> {
        let cmd = Cred2Command::GetCropping;
        let reply = self.query(link, &cmd)?;
        parse_crop(&cmd.wire(), &reply)
    }

    /// Read the crop back and re-send whichever axis differs. Each of the
    /// [`CROP_ATTEMPTS`] attempts is followed by a settle delay; a final read
    /// verifies the last one. Exhausting the attempts is fatal.
    pub fn set_check_cropping(
        &self,
        link: &mut dyn SerialLink,
        want: CropWindow,
    ) -> Result<CropWindow, CameraError> {
        for attempt in 1..=CROP_ATTEMPTS {
            let reported = self.get_cropping(link)?;
            if reported == want {
                return Ok(want);
            }
            tracing::debug!(camera = %self.model, attempt, "crop is {reported}, want {want}");
            if (reported.x0, reported.x1) != (want.x0, want.x1) {
                self.query(link, &Cred2Command::SetCropColumns(want.x0, want.x1))?;
                self.settle();
            }
            if (reported.y0, reported.y1) != (want.y0, want.y1) {
                self.query(link, &Cred2Command::SetCropRows(want.y0, want.y1))?;
                self.settle();
            }
        }
        let reported = self.get_cropping(link)?;
        if reported == want {
            return Ok(want);
        }
        Err(CameraError::CropMismatch {
            requested: want,
            reported,
            attempts: CROP_ATTEMPTS,
        })
    }

    pub fn set_synchro(&mut self, link: &mut dyn SerialLink, synchro: bool) -> Result<bool, CameraError> {
        self.query(link, &Cred2Command::SetExtSynchro(synchro))?;
        let cmd = Cred2Command::GetExtSynchro;
        let reply = self.query(link, &cmd)?;
        self.synchro = parse_on_off(&cmd.wire(), &reply)?;
        Ok(self.synchro)
    }

    pub fn set_gain(&self, link: &mut dyn SerialLink, gain: Gain) -> Result<Gain, CameraError> {
        self.query(link, &Cred2Command::SetGain(gain))?;
        self.get_gain(link)
    }

    pub fn get_gain(&self, link: &mut dyn SerialLink) -> Result<Gain, CameraError> {
        let cmd = Cred2Command::GetGain;
        let reply = self.query(link, &cmd)?;
        reply.parse().map_err(|_| bad_reply(&cmd.wire(), &reply))
    }

    pub fn set_ndr(&mut self, link: &mut dyn SerialLink, ndr: u32) -> Result<u32, CameraError> {
        self.query(link, &Cred2Command::SetNdr(ndr))?;
        self.get_ndr(link)
    }

    pub fn get_ndr(&mut self, link: &mut dyn SerialLink) -> Result<u32, CameraError> {
        let ndr = self.query_value(link, &Cred2Command::GetNdr)?;
        self.ndr = Some(ndr);
        Ok(ndr)
    }

    pub fn set_fps(&self, link: &mut dyn SerialLink, fps: f64) -> Result<f64, CameraError> {
        self.query(link, &Cred2Command::SetFps(fps))?;
        self.get_fps(link)
    }

    pub fn get_fps(&self, link: &mut dyn SerialLink) -> Result<f64, CameraError> {
        self.query_value(link, &Cred2Command::GetFps)
    }

    pub fn max_fps(&self, link: &mut dyn SerialLink) -> Result<f64, CameraError> {
        self.query_value(link, &Cred2Command::GetMaxFps)
    }

    pub fn set_tint(&self, link: &mut dyn SerialLink, tint: f64) -> Result<f64, CameraError> {
        self.query(link, &Cred2Command::SetTint(tint))?;
        self.get_tint(link)
    }

    pub fn get_tint(&self, link: &mut dyn SerialLink) -> Result<f64, CameraError> {
        self.query_value(link, &Cred2Command::GetTint)
    }

    pub fn max_tint(&self, link: &mut dyn SerialLink) -> Result<f64, CameraError> {
        self.query_value(link, &Cred2Command::GetMaxTint)
    }

    /// Sensor temperature in Celsius.
    pub fn get_temperature(&self, link: &mut dyn SerialLink) -> Result<f64, CameraError> {
        self.query_value(link, &Cred2Command::GetTemperature)
    }

    pub fn set_temperature_setpoint(
        &self,
        link: &mut dyn SerialLink,
        celsius: f64,
    ) -> Result<f64, CameraError> {
        self.query(link, &Cred2Command::SetTemperatureSetpoint(celsius))?;
        self.query_value(link, &Cred2Command::GetTemperatureSetpoint)
    }
}

impl CameraControl for Cred2 {
    fn family(&self) -> &str {
        "CRED2"
    }

    fn on_open(&mut self, link: &mut dyn SerialLink) -> Result<(), CameraError> {
        self.query(link, &Cred2Command::SetFanManual)?;
        self.query(link, &Cred2Command::SetFanSpeed(0))?;
        self.query(link, &Cred2Command::SetLed(false))?;
        self.set_gain(link, self.gain_on_open)?;
        self.set_temperature_setpoint(link, self.temperature_setpoint)?;
        Ok(())
    }

    fn prepare(
        &mut self,
        link: &mut dyn SerialLink,
        id: &ModeId,
        mode: &CameraMode,
    ) -> Result<(), CameraError> {
        self.query(link, &Cred2Command::SetCropping(!id.is_full()))?;
        self.set_check_cropping(link, mode.window)?;
        // Crop changes trip the external sync; restore it.
        self.set_synchro(link, self.synchro)?;
        Ok(())
    }

    fn finalize(
        &mut self,
        link: &mut dyn SerialLink,
        _id: &ModeId,
        mode: &CameraMode,
    ) -> Result<(), CameraError> {
        if self.ndr.is_none() {
            self.set_ndr(link, 1)?;
        }
        if let Some(fps) = mode.fps {
            self.set_fps(link, fps)?;
        }
        if let Some(tint) = mode.tint {
            self.set_tint(link, tint)?;
        }
        Ok(())
    }

    fn fill_keywords(
        &mut self,
        link: &mut dyn SerialLink,
        id: &ModeId,
        mode: &CameraMode,
        keywords: &mut StreamKeywords,
    ) -> Result<(), CameraError> {
        keywords.set("CROPPED", !id.is_full());
        keywords.set("CROP_OR1", mode.window.x0);
        keywords.set("CROP_OR2", mode.window.y0);
        let ndr = self.get_ndr(link)?;
        keywords.set("NDR", ndr);
        keywords.set("DETMODE", if ndr > 1 { "IMRO" } else { "Single" });
        keywords.set("EXPTIME", self.get_tint(link)?);
        keywords.set("FRATE", self.get_fps(link)?);
        keywords.set("DETGAIN", self.get_gain(link)?.to_string());
        keywords.set("DET-TMP", self.get_temperature(link)? + CELSIUS_TO_KELVIN);
        keywords.set("EXTTRIG", self.synchro);
        Ok(())
    }

    fn request(
        &mut self,
        link: &mut dyn SerialLink,
        request: &CameraRequest,
        keywords: &mut StreamKeywords,
    ) -> Result<String, CameraError> {
        let reply = match request {
            CameraRequest::Fps(set) => {
                let fps = match set {
                    Some(v) => self.set_fps(link, *v)?,
                    None => self.get_fps(link)?,
                };
                keywords.set("FRATE", fps);
                fps.to_string()
            }
            CameraRequest::MaxFps => self.max_fps(link)?.to_string(),
            CameraRequest::Tint(set) => {
                let tint = match set {
                    Some(v) => self.set_tint(link, *v)?,
                    None => self.get_tint(link)?,
                };
                keywords.set("EXPTIME", tint);
                tint.to_string()
            }
            CameraRequest::MaxTint => self.max_tint(link)?.to_string(),
            CameraRequest::Gain(set) => {
                let gain = match set {
                    Some(name) => {
                        let gain = name.parse().map_err(|reason| CameraError::InvalidArgument {
                            request: request.to_string(),
                            reason,
                        })?;
                        self.set_gain(link, gain)?
                    }
                    None => self.get_gain(link)?,
                };
                keywords.set("DETGAIN", gain.to_string());
                gain.to_string()
            }
            CameraRequest::Ndr(set) => {
                let ndr = match set {
                    Some(n) => self.set_ndr(link, *n)?,
                    None => self.get_ndr(link)?,
                };
                keywords.set("NDR", ndr);
                keywords.set("DETMODE", if ndr > 1 { "IMRO" } else { "Single" });
                ndr.to_string()
            }
            CameraRequest::Temperature => {
                let celsius = self.get_temperature(link)?;
                keywords.set("DET-TMP", celsius + CELSIUS_TO_KELVIN);
                celsius.to_string()
            }
            CameraRequest::TemperatureSetpoint(celsius) => {
                self.temperature_setpoint = *celsius;
                self.set_temperature_setpoint(link, *celsius)?.to_string()
            }
            CameraRequest::Synchro(on) => {
                let synchro = self.set_synchro(link, *on)?;
                keywords.set("EXTTRIG", synchro);
                on_off(synchro).to_string()
            }
        };
        Ok(reply)
    }
}

// ─── Mode tables ────────────────────────────────────────────────

fn base_entries() -> Vec<(ModeId, CameraMode)> {
    vec![
        // 640 x 512
        (ModeId::full(), CameraMode::new(CRED2_SENSOR.full_window())),
        // 320 x 256, centered
        (
            ModeId::Index(0),
            CameraMode::new(CropWindow::new(160, 479, 128, 383)).with_timing(1500.082358, 0.000663336),
        ),
    ]
}

pub fn cred2_modes() -> Result<ModeTable, ModeError> {
    ModeTable::new(CRED2_SENSOR, base_entries())
}

pub fn rajni_modes() -> Result<ModeTable, ModeError> {
    cred2_modes()
}

pub fn glint_modes() -> Result<ModeTable, ModeError> {
    let mut entries = base_entries();
    entries.push((
        ModeId::Index(12),
        CameraMode::new(CropWindow::new(224, 319, 80, 423)).with_timing(1394.833104, 0.000711851),
    ));
    ModeTable::new(CRED2_SENSOR, entries)
}

/// Chuck: modes 1-5 centred, and 6-11 as 0-5 shifted 32 columns left.
pub fn chuck_modes() -> Result<ModeTable, ModeError> {
    let mut entries = base_entries();
    entries.extend([
        // 224 x 188
        (
            ModeId::Index(1),
            CameraMode::new(CropWindow::new(192, 415, 160, 347)).with_timing(2050.202611, 0.000483913),
        ),
        // 128 x 128
        (
            ModeId::Index(2),
            CameraMode::new(CropWindow::new(256, 383, 192, 319)).with_timing(4500.617741, 0.000218568),
        ),
        // 64 x 64
        (
            ModeId::Index(3),
            CameraMode::new(CropWindow::new(288, 351, 224, 287)).with_timing(9203.638201, 0.000105249),
        ),
        // 192 x 192
        (
            ModeId::Index(4),
            CameraMode::new(CropWindow::new(224, 415, 160, 351)).with_timing(2200.024157, 0.000449819),
        ),
        // 96 x 72
        (
            ModeId::Index(5),
            CameraMode::new(CropWindow::new(256, 351, 220, 291)).with_timing(8002.636203, 0.000121555),
        ),
    ]);
    let mut shifted = Vec::with_capacity(6);
    for i in 0..6u32 {
        let base = entries
            .iter()
            .find(|(id, _)| *id == ModeId::Index(i))
            .map(|(_, m)| *m)
            .ok_or(ModeError::UnknownMode(ModeId::Index(i)))?;
        let moved = base
            .shift_columns(-32)
            .ok_or(ModeError::Underivable(ModeId::Index(i + 6)))?;
        shifted.push((ModeId::Index(i + 6), moved));
    }
    entries.extend(shifted);
    ModeTable::new(CRED2_SENSOR, entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted CRED2: answers queries from fixed state, records writes.
    struct ScriptedCred2 {
        crop: VecDeque<CropWindow>,
        sent: Vec<String>,
    }

    impl ScriptedCred2 {
        fn reporting(crops: &[CropWindow]) -> Self {
            Self {
                crop: crops.iter().copied().collect(),
                sent: Vec::new(),
            }
        }
    }

    impl SerialLink for ScriptedCred2 {
        fn send(&mut self, command: &str) -> Result<String, CameraError> {
            self.sent.push(command.to_string());
            Ok(match command {
                "cropping raw" => {
                    let c = if self.crop.len() > 1 {
                        self.crop.pop_front().unwrap_or(CropWindow::new(0, 0, 0, 0))
                    } else {
                        self.crop.front().copied().unwrap_or(CropWindow::new(0, 0, 0, 0))
                    };
                    format!("on:{}-{}:{}-{}\r\nfli-cli>", c.x0, c.x1, c.y0, c.y1)
                }
                "extsynchro raw" => "off".to_string(),
                "sensibility raw" => "high".to_string(),
                "nbreadworeset raw" => "1".to_string(),
                "fps raw" => "1500.08".to_string(),
                "tint raw" => "0.000663".to_string(),
                "temp snake raw" => "-40.0".to_string(),
                "temp snake setpoint raw" => "-40.0".to_string(),
                "maxfps raw" => "1600.5".to_string(),
                "maxtint raw" => "0.000612".to_string(),
                _ => String::new(),
            })
        }
    }

    fn count(link: &ScriptedCred2, cmd: &str) -> usize {
        link.sent.iter().filter(|s| s.as_str() == cmd).count()
    }

    #[test]
    fn command_wire_forms() {
        assert_eq!(Cred2Command::SetCropRows(128, 383).wire(), "set cropping rows 128-383");
        assert_eq!(Cred2Command::SetGain(Gain::High).wire(), "set sensibility high");
        assert_eq!(Cred2Command::SetTemperatureSetpoint(-40.0).wire(), "set temp snake -40.0");
        assert_eq!(Cred2Command::SetFps(1500.5).wire(), "set fps 1500.5");
        assert_eq!(Cred2Command::SetCropping(false).wire(), "set cropping off");
    }

    #[test]
    fn reply_error_token_rejected() {
        let err = check_reply("set fps 99999", "Error: fps out of range").expect_err("rejected");
        assert!(matches!(err, CameraError::Rejected { .. }));
        assert_eq!(check_reply("fps raw", " 1500.0\r\nfli-cli>").expect("ok"), "1500.0");
    }

    #[test]
    fn parse_crop_reply() {
        let w = parse_crop("cropping raw", "on:160-479:128-383").expect("parse");
        assert_eq!(w, CropWindow::new(160, 479, 128, 383));
        assert!(parse_crop("cropping raw", "garbage").is_err());
        assert!(parse_crop("cropping raw", "on:1-x:2-3").is_err());
    }

    #[test]
    fn crop_already_right_reads_once() {
        let want = CropWindow::new(160, 479, 128, 383);
        let mut link = ScriptedCred2::reporting(&[want]);
        let cam = Cred2::new("rajni").with_crop_settle(Duration::ZERO);
        cam.set_check_cropping(&mut link, want).expect("ok");
        assert_eq!(count(&link, "cropping raw"), 1);
        assert!(!link.sent.iter().any(|s| s.starts_with("set cropping")));
    }

    #[test]
    fn crop_accepted_on_second_try() {
        let want = CropWindow::new(224, 319, 80, 423);
        let mut link = ScriptedCred2::reporting(&[CRED2_SENSOR.full_window(), want]);
        let cam = Cred2::new("glint").with_crop_settle(Duration::ZERO);
        cam.set_check_cropping(&mut link, want).expect("ok");
        assert_eq!(count(&link, "cropping raw"), 2);
        assert_eq!(count(&link, "set cropping columns 224-319"), 1);
        assert_eq!(count(&link, "set cropping rows 80-423"), 1);
    }

    #[test]
    fn crop_never_accepted_fails_after_exactly_three_attempts() {
        let stuck = CRED2_SENSOR.full_window();
        let want = CropWindow::new(160, 479, 128, 383);
        let mut link = ScriptedCred2::reporting(&[stuck]);
        let cam = Cred2::new("rajni").with_crop_settle(Duration::ZERO);
        let err = cam.set_check_cropping(&mut link, want).expect_err("fatal");
        match err {
            CameraError::CropMismatch {
                requested,
                reported,
                attempts,
            } => {
                assert_eq!(requested, want);
                assert_eq!(reported, stuck);
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(count(&link, "set cropping columns 160-479"), 3);
        assert_eq!(count(&link, "set cropping rows 128-383"), 3);
        assert_eq!(count(&link, "cropping raw"), 4);
    }

    #[test]
    fn crop_accepted_after_last_attempt() {
        let stuck = CRED2_SENSOR.full_window();
        let want = CropWindow::new(160, 479, 128, 383);
        let mut link = ScriptedCred2::reporting(&[stuck, stuck, stuck, want]);
        let cam = Cred2::new("rajni").with_crop_settle(Duration::ZERO);
        assert_eq!(cam.set_check_cropping(&mut link, want).expect("ok"), want);
        assert_eq!(count(&link, "set cropping columns 160-479"), 3);
        assert_eq!(count(&link, "cropping raw"), 4);
    }

    #[test]
    fn only_wrong_axis_is_resent() {
        let want = CropWindow::new(160, 479, 128, 383);
        let rows_wrong = CropWindow::new(160, 479, 0, 511);
        let mut link = ScriptedCred2::reporting(&[rows_wrong, want]);
        let cam = Cred2::new("rajni").with_crop_settle(Duration::ZERO);
        cam.set_check_cropping(&mut link, want).expect("ok");
        assert!(!link.sent.iter().any(|s| s.starts_with("set cropping columns")));
        assert_eq!(count(&link, "set cropping rows 128-383"), 1);
    }

    #[test]
    fn on_open_issues_standards() {
        let mut link = ScriptedCred2::reporting(&[CRED2_SENSOR.full_window()]);
        let mut cam = Cred2::new("chuck");
        cam.on_open(&mut link).expect("ok");
        assert_eq!(
            &link.sent[..5],
            &[
                "set fan mode manual",
                "set fan speed 0",
                "set led off",
                "set sensibility high",
                "sensibility raw",
            ]
        );
        assert!(link.sent.iter().any(|s| s == "set temp snake -40.0"));
    }

    #[test]
    fn prepare_full_turns_cropping_off() {
        let mut link = ScriptedCred2::reporting(&[CRED2_SENSOR.full_window()]);
        let mut cam = Cred2::new("rajni").with_crop_settle(Duration::ZERO);
        let table = cred2_modes().expect("table");
        let full = ModeId::full();
        cam.prepare(&mut link, &full, table.get(&full).expect("mode"))
            .expect("ok");
        assert_eq!(link.sent[0], "set cropping off");
        assert!(link.sent.iter().any(|s| s == "set extsynchro off"));
    }

    #[test]
    fn finalize_sets_ndr_once_then_timing() {
        let mut link = ScriptedCred2::reporting(&[CRED2_SENSOR.full_window()]);
        let mut cam = Cred2::new("rajni");
        let table = cred2_modes().expect("table");
        let id = ModeId::Index(0);
        let mode = table.get(&id).expect("mode");
        cam.finalize(&mut link, &id, mode).expect("ok");
        cam.finalize(&mut link, &id, mode).expect("ok");
        assert_eq!(count(&link, "set nbreadworeset 1"), 1);
        assert_eq!(count(&link, "set fps 1500.082358"), 2);
        assert_eq!(count(&link, "set tint 0.000663336"), 2);
    }

    #[test]
    fn keywords_read_back() {
        let mut link = ScriptedCred2::reporting(&[CRED2_SENSOR.full_window()]);
        let mut cam = Cred2::new("rajni");
        let table = cred2_modes().expect("table");
        let id = ModeId::Index(0);
        let mut kw = StreamKeywords::new("rajni");
        cam.fill_keywords(&mut link, &id, table.get(&id).expect("mode"), &mut kw)
            .expect("ok");
        use crate::keywords::KeywordValue;
        assert_eq!(kw.get("CROPPED"), Some(&KeywordValue::Bool(true)));
        assert_eq!(kw.get("CROP_OR1"), Some(&KeywordValue::Int(160)));
        assert_eq!(kw.get("DETGAIN"), Some(&KeywordValue::Text("high".to_string())));
        assert_eq!(kw.get("DETMODE"), Some(&KeywordValue::Text("Single".to_string())));
        assert_eq!(kw.get("FRATE"), Some(&KeywordValue::Float(1500.08)));
        match kw.get("DET-TMP") {
            Some(KeywordValue::Float(k)) => assert!((k - 233.15).abs() < 1e-9),
            other => panic!("unexpected DET-TMP {other:?}"),
        }
    }

    #[test]
    fn operator_requests_update_keywords() {
        let mut link = ScriptedCred2::reporting(&[CRED2_SENSOR.full_window()]);
        let mut cam = Cred2::new("glint");
        let mut kw = StreamKeywords::new("glint");
        use crate::keywords::KeywordValue;

        let reply = cam
            .request(&mut link, &CameraRequest::Fps(Some(1500.08)), &mut kw)
            .expect("fps");
        assert_eq!(reply, "1500.08");
        assert_eq!(count(&link, "set fps 1500.08"), 1);
        assert_eq!(kw.get("FRATE"), Some(&KeywordValue::Float(1500.08)));

        assert_eq!(cam.request(&mut link, &CameraRequest::MaxFps, &mut kw).expect("max"), "1600.5");
        assert_eq!(cam.request(&mut link, &CameraRequest::MaxTint, &mut kw).expect("max"), "0.000612");

        let reply = cam
            .request(&mut link, &CameraRequest::Gain(Some("high".to_string())), &mut kw)
            .expect("gain");
        assert_eq!(reply, "high");
        assert_eq!(count(&link, "set sensibility high"), 1);
        let err = cam
            .request(&mut link, &CameraRequest::Gain(Some("loud".to_string())), &mut kw)
            .expect_err("bad gain");
        assert!(matches!(err, CameraError::InvalidArgument { .. }));

        cam.request(&mut link, &CameraRequest::Ndr(Some(1)), &mut kw).expect("ndr");
        assert_eq!(count(&link, "set nbreadworeset 1"), 1);
        assert_eq!(kw.get("DETMODE"), Some(&KeywordValue::Text("Single".to_string())));

        assert_eq!(cam.request(&mut link, &CameraRequest::Temperature, &mut kw).expect("temp"), "-40");
        cam.request(&mut link, &CameraRequest::TemperatureSetpoint(-35.0), &mut kw)
            .expect("setpoint");
        assert_eq!(count(&link, "set temp snake -35.0"), 1);

        assert_eq!(cam.request(&mut link, &CameraRequest::Synchro(false), &mut kw).expect("sync"), "off");
        assert_eq!(count(&link, "set extsynchro off"), 1);
        assert_eq!(kw.get("EXTTRIG"), Some(&KeywordValue::Bool(false)));
    }

    #[test]
    fn family_tables() {
        assert_eq!(cred2_modes().expect("ok").len(), 2);
        assert_eq!(rajni_modes().expect("ok"), cred2_modes().expect("ok"));
        let glint = glint_modes().expect("ok");
        assert_eq!(glint.get(&ModeId::Index(12)).expect("12").width(), 96);
        let chuck = chuck_modes().expect("ok");
        assert_eq!(chuck.len(), 13);
        let m6 = chuck.get(&ModeId::Index(6)).expect("6");
        assert_eq!(m6.window, CropWindow::new(128, 447, 128, 383));
        let m11 = chuck.get(&ModeId::Index(11)).expect("11");
        assert_eq!(m11.window, CropWindow::new(224, 319, 220, 291));
        assert_eq!(m11.fps, Some(8002.636203));
    }
}
