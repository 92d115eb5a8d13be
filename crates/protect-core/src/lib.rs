// protect-core: Device-state synchronization layer above protect-api.

pub mod config;
pub mod convert;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{NvrConfig, TlsVerification};
pub use coordinator::{CoordinatorState, ProtectData, SubscriptionHandle, UpdateCallback};
pub use error::CoreError;
pub use store::DeviceStore;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    CameraState, Device, DeviceDetails, DeviceKind, IrMode, LightState, MotionEvent, MotionState,
    NvrState, RecordingMode, SensorState,
};
