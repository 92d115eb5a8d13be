// ── Wire → domain conversion ──
//
// Normalizes the NVR's raw records into the canonical model exactly once,
// at ingestion. Enum parse failures degrade to `None` rather than failing
// the whole refresh -- the NVR grows new mode strings across firmware
// versions and an unknown one must not take the integration down.

use std::str::FromStr;

use protect_api::models::{
    Bootstrap, CameraRecord, LightRecord, MotionEventRecord, NvrRecord, SensorRecord, ViewerRecord,
};

use crate::model::{
    CameraState, Device, DeviceDetails, IrMode, LightState, MotionEvent, MotionState, NvrState,
    RecordingMode, SensorState,
};

/// Port every RTSP alias resolves against.
const RTSP_PORT: u16 = 7447;

/// Flatten a bootstrap payload into domain devices, NVR identity first.
pub fn devices_from_bootstrap(bootstrap: &Bootstrap) -> Vec<Device> {
    let mut devices = Vec::new();

    if let Some(nvr) = &bootstrap.nvr {
        devices.push(device_from_nvr(nvr));
    }
    devices.extend(bootstrap.cameras.iter().map(device_from_camera));
    devices.extend(bootstrap.sensors.iter().map(device_from_sensor));
    devices.extend(bootstrap.lights.iter().map(device_from_light));
    devices.extend(bootstrap.viewers.iter().map(device_from_viewer));

    devices
}

pub fn device_from_camera(record: &CameraRecord) -> Device {
    let state = CameraState {
        recording_mode: record
            .recording_settings
            .as_ref()
            .and_then(|s| s.mode.as_deref())
            .and_then(|m| RecordingMode::from_str(m).ok()),
        ir_mode: record
            .isp_settings
            .as_ref()
            .and_then(|s| s.ir_led_mode.as_deref())
            .and_then(|m| IrMode::from_str(m).ok()),
        last_motion: record.last_motion,
        rtsp_source: rtsp_source(record),
        wdr_level: record.isp_settings.as_ref().and_then(|s| s.wdr),
        mic_volume: record.mic_volume,
        zoom_position: record.isp_settings.as_ref().and_then(|s| s.zoom_position),
        motion: MotionState::default(),
    };

    let is_doorbell = record.feature_flags.as_ref().is_some_and(|f| f.has_chime)
        || record
            .model
            .as_deref()
            .is_some_and(|m| m.contains("Doorbell"));
    let details = if is_doorbell {
        DeviceDetails::Doorbell(state)
    } else {
        DeviceDetails::Camera(state)
    };

    Device {
        id: record.id.clone(),
        name: display_name(record.name.as_deref(), &record.id),
        model: record.model.clone(),
        online: is_online(record.state.as_deref()),
        up_since: record.up_since,
        details,
    }
}

pub fn device_from_sensor(record: &SensorRecord) -> Device {
    Device {
        id: record.id.clone(),
        name: display_name(record.name.as_deref(), &record.id),
        model: record.model.clone(),
        online: is_online(record.state.as_deref()),
        up_since: record.up_since,
        details: DeviceDetails::Sensor(SensorState {
            motion_detected: record.is_motion_detected,
            battery_percentage: record.battery_status.as_ref().and_then(|b| b.percentage),
        }),
    }
}

pub fn device_from_light(record: &LightRecord) -> Device {
    Device {
        id: record.id.clone(),
        name: display_name(record.name.as_deref(), &record.id),
        model: record.model.clone(),
        online: is_online(record.state.as_deref()),
        up_since: record.up_since,
        details: DeviceDetails::Light(LightState {
            is_on: record.is_light_on,
            last_motion: record.last_motion,
        }),
    }
}

pub fn device_from_viewer(record: &ViewerRecord) -> Device {
    Device {
        id: record.id.clone(),
        name: display_name(record.name.as_deref(), &record.id),
        model: record.model.clone(),
        online: is_online(record.state.as_deref()),
        up_since: record.up_since,
        details: DeviceDetails::Viewer,
    }
}

pub fn device_from_nvr(record: &NvrRecord) -> Device {
    Device {
        id: record.id.clone(),
        name: display_name(record.name.as_deref(), &record.id),
        model: record.model.clone(),
        online: true,
        up_since: record.up_since,
        details: DeviceDetails::Nvr(NvrState {
            mac: record.mac.clone(),
            firmware_version: record.version.clone(),
        }),
    }
}

/// Normalize a raw event record. `None` when the record names no camera.
pub fn motion_event(record: &MotionEventRecord) -> Option<MotionEvent> {
    Some(MotionEvent {
        camera_id: record.camera.clone()?,
        start: record.start,
        end: record.end,
        score: record.score,
        thumbnail: record.thumbnail.clone(),
    })
}

/// RTSP source of the first stream-enabled channel, if any.
fn rtsp_source(record: &CameraRecord) -> Option<String> {
    let host = record.connection_host.as_deref()?;
    record.channels.iter().find_map(|channel| {
        if !channel.is_rtsp_enabled {
            return None;
        }
        channel
            .rtsp_alias
            .as_deref()
            .map(|alias| format!("rtsp://{host}:{RTSP_PORT}/{alias}"))
    })
}

fn is_online(state: Option<&str>) -> bool {
    state == Some("CONNECTED")
}

fn display_name(name: Option<&str>, id: &str) -> String {
    match name {
        Some(n) if !n.is_empty() => n.to_owned(),
        _ => id.to_owned(),
    }
}
