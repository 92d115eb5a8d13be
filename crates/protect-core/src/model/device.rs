// ── Device domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Closed device category enumeration.
///
/// Used as the selector for
/// [`devices_by_kind`](crate::ProtectData::devices_by_kind) and derived
/// from [`DeviceDetails`] -- never stored separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    Camera,
    Doorbell,
    Sensor,
    Light,
    Viewer,
    Nvr,
}

/// Camera recording mode.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
pub enum RecordingMode {
    #[strum(serialize = "never")]
    Never,
    #[strum(serialize = "motion")]
    Motion,
    #[strum(serialize = "always")]
    Always,
}

/// Camera infrared LED mode.
///
/// Wire values are `auto`, `on`, `autoFilterOnly`, `off`; the extra
/// serializations are the host-facing aliases the original integration
/// accepted for the same states.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
pub enum IrMode {
    #[strum(serialize = "auto")]
    Auto,
    #[strum(serialize = "on", serialize = "always_on")]
    On,
    #[strum(serialize = "autoFilterOnly", serialize = "led_off")]
    AutoFilterOnly,
    #[strum(serialize = "off", serialize = "always_off")]
    Off,
}

impl IrMode {
    /// The value the NVR expects in a PATCH body.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::On => "on",
            Self::AutoFilterOnly => "autoFilterOnly",
            Self::Off => "off",
        }
    }
}

impl RecordingMode {
    /// The value the NVR expects in a PATCH body.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::Motion => "motion",
            Self::Always => "always",
        }
    }
}

/// Live motion tracking for a camera-class device.
///
/// Only event processing touches these fields; bootstrap refreshes leave
/// them alone so a poll can never erase an in-progress motion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionState {
    /// Motion currently in progress (event open and score above threshold).
    pub active: bool,
    /// Score of the most recent motion event.
    pub score: i64,
    /// Start instant of the most recent motion event.
    pub start: Option<DateTime<Utc>>,
    /// Last known thumbnail id. Retained across events that carry none.
    pub thumbnail: Option<String>,
}

/// Attributes valid for camera-class devices (cameras and doorbells).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraState {
    pub recording_mode: Option<RecordingMode>,
    pub ir_mode: Option<IrMode>,
    pub last_motion: Option<DateTime<Utc>>,
    /// RTSP source of the first stream-enabled channel, if any.
    pub rtsp_source: Option<String>,
    pub wdr_level: Option<i64>,
    pub mic_volume: Option<i64>,
    pub zoom_position: Option<i64>,
    pub motion: MotionState,
}

/// Attributes valid for sensors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorState {
    pub motion_detected: bool,
    pub battery_percentage: Option<i64>,
}

/// Attributes valid for floodlights.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightState {
    pub is_on: bool,
    pub last_motion: Option<DateTime<Utc>>,
}

/// Attributes valid for the NVR itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NvrState {
    pub mac: Option<String>,
    pub firmware_version: Option<String>,
}

/// Category-specific attributes, one variant per device class.
///
/// Each variant carries only the attribute subset valid for that class,
/// so a sensor can never hold a recording mode and a viewer can never
/// hold motion state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceDetails {
    Camera(CameraState),
    Doorbell(CameraState),
    Sensor(SensorState),
    Light(LightState),
    Viewer,
    Nvr(NvrState),
}

/// A normalized motion event, ready for repository ingestion.
///
/// `end == None` means the motion is still open; whether that marks the
/// device motion-active also depends on the configured minimum score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionEvent {
    pub camera_id: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub score: i64,
    pub thumbnail: Option<String>,
}

/// The canonical device type mirrored from the NVR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Stable device id, unique across the repository.
    pub id: String,
    pub name: String,
    pub model: Option<String>,
    pub online: bool,
    pub up_since: Option<DateTime<Utc>>,
    pub details: DeviceDetails,
}

impl Device {
    /// The closed category this device belongs to.
    pub fn kind(&self) -> DeviceKind {
        match self.details {
            DeviceDetails::Camera(_) => DeviceKind::Camera,
            DeviceDetails::Doorbell(_) => DeviceKind::Doorbell,
            DeviceDetails::Sensor(_) => DeviceKind::Sensor,
            DeviceDetails::Light(_) => DeviceKind::Light,
            DeviceDetails::Viewer => DeviceKind::Viewer,
            DeviceDetails::Nvr(_) => DeviceKind::Nvr,
        }
    }

    /// Camera-class attributes, for cameras and doorbells.
    pub fn camera(&self) -> Option<&CameraState> {
        match &self.details {
            DeviceDetails::Camera(state) | DeviceDetails::Doorbell(state) => Some(state),
            _ => None,
        }
    }

    pub(crate) fn camera_mut(&mut self) -> Option<&mut CameraState> {
        match &mut self.details {
            DeviceDetails::Camera(state) | DeviceDetails::Doorbell(state) => Some(state),
            _ => None,
        }
    }
}
