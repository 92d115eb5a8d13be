// ── Device state storage ──

mod device_store;

pub use device_store::DeviceStore;
