// Protect API response types
//
// Models for the NVR's JSON API. Fields use `#[serde(default)]` liberally
// because the API is inconsistent about field presence across firmware
// versions. Timestamps arrive as epoch milliseconds and are converted to
// `DateTime<Utc>` at the deserialization boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Timestamp codec ──────────────────────────────────────────────────

/// Serde adapter for the NVR's epoch-millisecond timestamps.
///
/// `null`, a missing field, and an out-of-range value all map to `None`.
pub mod epoch_ms {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<i64>::deserialize(deserializer)?;
        Ok(millis.and_then(DateTime::from_timestamp_millis))
    }

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_some(&ts.timestamp_millis()),
            None => serializer.serialize_none(),
        }
    }
}

// ── Bootstrap ────────────────────────────────────────────────────────

/// Full-state snapshot of everything the NVR knows about.
///
/// `GET /{prefix}/bootstrap`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bootstrap {
    #[serde(default)]
    pub nvr: Option<NvrRecord>,
    #[serde(default)]
    pub cameras: Vec<CameraRecord>,
    #[serde(default)]
    pub sensors: Vec<SensorRecord>,
    #[serde(default)]
    pub lights: Vec<LightRecord>,
    #[serde(default)]
    pub viewers: Vec<ViewerRecord>,
}

/// NVR identity block from the bootstrap payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NvrRecord {
    pub id: String,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub model: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(rename = "upSince", default, with = "epoch_ms")]
    pub up_since: Option<DateTime<Utc>>,
}

/// Camera record from the bootstrap payload.
///
/// The NVR returns 100+ fields per camera; we model the ones the sync
/// engine consumes explicitly and ignore the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub model: Option<String>,
    /// Connectivity state string, `"CONNECTED"` when online.
    #[serde(default)]
    pub state: Option<String>,
    #[serde(rename = "lastMotion", default, with = "epoch_ms")]
    pub last_motion: Option<DateTime<Utc>>,
    #[serde(rename = "upSince", default, with = "epoch_ms")]
    pub up_since: Option<DateTime<Utc>>,
    #[serde(rename = "connectionHost", default)]
    pub connection_host: Option<String>,
    #[serde(rename = "recordingSettings", default)]
    pub recording_settings: Option<RecordingSettings>,
    #[serde(rename = "ispSettings", default)]
    pub isp_settings: Option<IspSettings>,
    #[serde(rename = "micVolume", default)]
    pub mic_volume: Option<i64>,
    #[serde(default)]
    pub channels: Vec<ChannelRecord>,
    #[serde(rename = "featureFlags", default)]
    pub feature_flags: Option<FeatureFlags>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSettings {
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IspSettings {
    #[serde(rename = "irLedMode", default)]
    pub ir_led_mode: Option<String>,
    #[serde(default)]
    pub wdr: Option<i64>,
    #[serde(rename = "zoomPosition", default)]
    pub zoom_position: Option<i64>,
}

/// Stream channel. Only RTSP availability matters to the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRecord {
    #[serde(rename = "isRtspEnabled", default)]
    pub is_rtsp_enabled: bool,
    #[serde(rename = "rtspAlias", default)]
    pub rtsp_alias: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Doorbell cameras report a chime; this is how the NVR distinguishes
    /// doorbells from plain cameras.
    #[serde(rename = "hasChime", default)]
    pub has_chime: bool,
}

/// Sensor record from the bootstrap payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub model: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(rename = "upSince", default, with = "epoch_ms")]
    pub up_since: Option<DateTime<Utc>>,
    #[serde(rename = "isMotionDetected", default)]
    pub is_motion_detected: bool,
    #[serde(rename = "batteryStatus", default)]
    pub battery_status: Option<BatteryStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatteryStatus {
    #[serde(default)]
    pub percentage: Option<i64>,
}

/// Light record from the bootstrap payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub model: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(rename = "upSince", default, with = "epoch_ms")]
    pub up_since: Option<DateTime<Utc>>,
    #[serde(rename = "isLightOn", default)]
    pub is_light_on: bool,
    #[serde(rename = "lastMotion", default, with = "epoch_ms")]
    pub last_motion: Option<DateTime<Utc>>,
}

/// Viewer (ViewPort) record from the bootstrap payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub model: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(rename = "upSince", default, with = "epoch_ms")]
    pub up_since: Option<DateTime<Utc>>,
}

// ── Events ───────────────────────────────────────────────────────────

/// Motion event from the event log or the WebSocket update feed.
///
/// `end == None` means the motion is still in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionEventRecord {
    #[serde(default)]
    pub id: Option<String>,
    /// Camera id the event belongs to.
    #[serde(default)]
    pub camera: Option<String>,
    #[serde(default, with = "epoch_ms")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, with = "epoch_ms")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

// ── Auth ─────────────────────────────────────────────────────────────

/// Response from the legacy access-key endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessKeyResponse {
    #[serde(rename = "accessKey")]
    pub access_key: String,
}
