//! camstack-core: lifecycle coordination for frame-grabber cameras.
//!
//! An [`AcquisitionController`] owns one camera's acquisition process and
//! the [`DependencySet`] of auxiliary processes (TCP transmit/receive, FITS
//! dumping, ZMQ relays) that hang off it, and drives them through
//! configure, start, mode change and close in a strict order.

pub mod audit;
pub mod camera;
pub mod config;
pub mod controller;
pub mod cred2;
pub mod dependency;
pub mod error;
pub mod grabber;
pub mod keywords;
pub mod mode;
pub mod process;
pub mod template;
pub mod transport;

pub use audit::{SessionAudit, SessionStatus, audit_sessions};
pub use camera::{CameraControl, CameraRequest, GenericCamera, SerialLink};
pub use config::{CameraDefinition, CameraFamily};
pub use controller::{AcquisitionConfig, AcquisitionController, ControllerParts, ControllerState};
pub use dependency::{DependencySet, PlanStep};
pub use error::{CamstackError, CameraError, ConfigError};
pub use grabber::{EdtGrabber, FrameGrabber, GrabberLayout};
pub use keywords::{KeywordValue, StreamKeywords};
pub use mode::{CameraMode, CropWindow, ModeId, ModeTable, SensorExtent};
pub use process::{DependentProcess, ProcessDescriptor, SchedulingTag};
pub use template::CliArg;
pub use transport::{ControlPlane, TmuxControlPlane};
