// ── Device state store ──
//
// Single-writer merge target for bootstrap snapshots and motion events.
// The coordinator owns one instance behind its own lock; nothing in here
// needs interior mutability.

use std::collections::HashMap;

use protect_api::models::Bootstrap;
use tracing::trace;

use crate::convert;
use crate::model::{Device, DeviceDetails, DeviceKind, MotionEvent};

pub struct DeviceStore {
    devices: HashMap<String, Device>,
    /// Events scoring below this are merged but never arm the motion flag.
    minimum_score: i64,
}

impl DeviceStore {
    pub fn new(minimum_score: i64) -> Self {
        Self {
            devices: HashMap::new(),
            minimum_score,
        }
    }

    /// Merge a bootstrap snapshot, returning the ids that changed.
    ///
    /// New devices land with quiescent motion state. Known devices get
    /// their configuration and identity refreshed while the live motion
    /// block is carried over untouched -- a poll landing mid-event must
    /// not clear a flag the event stream set.
    pub fn apply_bootstrap(&mut self, bootstrap: &Bootstrap) -> Vec<String> {
        let mut changed = Vec::new();

        for incoming in convert::devices_from_bootstrap(bootstrap) {
            match self.devices.get_mut(&incoming.id) {
                Some(existing) => {
                    let merged = merge_preserving_motion(existing, incoming);
                    if *existing != merged {
                        changed.push(existing.id.clone());
                        *existing = merged;
                    }
                }
                None => {
                    trace!(device_id = %incoming.id, "new device discovered");
                    changed.push(incoming.id.clone());
                    self.devices.insert(incoming.id.clone(), incoming);
                }
            }
        }

        changed
    }

    /// Merge one motion event, returning the camera id when state changed.
    ///
    /// An ended event always disarms, regardless of score. An ongoing one
    /// arms only at or above the score floor and disarms below it. Score
    /// and start are recorded either way; a thumbnail survives events that
    /// arrive without one.
    pub fn apply_motion_event(&mut self, event: &MotionEvent) -> Option<String> {
        let device = self.devices.get_mut(&event.camera_id)?;
        let motion = match &mut device.details {
            DeviceDetails::Camera(state) | DeviceDetails::Doorbell(state) => &mut state.motion,
            _ => return None,
        };

        let before = motion.clone();

        motion.active = event.end.is_none() && event.score >= self.minimum_score;
        motion.score = event.score;
        motion.start = event.start;
        if event.thumbnail.is_some() {
            motion.thumbnail = event.thumbnail.clone();
        }

        (*motion != before).then(|| event.camera_id.clone())
    }

    pub fn get(&self, id: &str) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Device> {
        self.devices.get_mut(id)
    }

    /// Devices whose kind is in `kinds`, in no particular order.
    pub fn get_by_kinds(&self, kinds: &[DeviceKind]) -> Vec<Device> {
        self.devices
            .values()
            .filter(|d| kinds.contains(&d.kind()))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Incoming snapshot of an existing device, with live motion carried over.
fn merge_preserving_motion(existing: &Device, mut incoming: Device) -> Device {
    if let (
        DeviceDetails::Camera(old) | DeviceDetails::Doorbell(old),
        DeviceDetails::Camera(new) | DeviceDetails::Doorbell(new),
    ) = (&existing.details, &mut incoming.details)
    {
        new.motion = old.motion.clone();
    }
    incoming
}
