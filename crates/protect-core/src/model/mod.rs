// ── Unified domain model ──
//
// Every type in this module is the canonical representation of an NVR
// entity. Wire records from `protect-api` are converted into these once,
// at ingestion, and consumers only ever see the clean form.

pub mod device;

pub use device::{
    CameraState, Device, DeviceDetails, DeviceKind, IrMode, LightState, MotionEvent, MotionState,
    NvrState, RecordingMode, SensorState,
};
