// ── Update coordinator ──
//
// Full lifecycle management for an NVR connection. Owns the device store,
// drives polling and the WebSocket push stream, and fans per-device change
// notifications out to subscribers. Control operations route through here
// so confirmed values land in the store immediately instead of waiting for
// the next poll.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::watch;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use protect_api::transport::{TlsMode, TransportConfig};
use protect_api::websocket::{ReconnectConfig, WebSocketHandle};
use protect_api::ProtectClient;

use crate::config::{NvrConfig, TlsVerification};
use crate::convert;
use crate::error::CoreError;
use crate::model::{Device, DeviceKind, IrMode, RecordingMode};
use crate::store::DeviceStore;

/// How far back each poll looks for motion events.
const EVENT_LOOKBACK_SECS: u64 = 86_400;

/// Snapshot dimensions by camera generation.
const SNAPSHOT_HD: (u32, u32) = (1280, 720);
const SNAPSHOT_SD: (u32, u32) = (1024, 576);

/// Callback invoked with the updated device after each change.
pub type UpdateCallback = Arc<dyn Fn(&Device) + Send + Sync>;

/// Opaque subscription token; pass back to [`ProtectData::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

/// Coordinator lifecycle, observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Stopped,
    Starting,
    Running,
}

// ── ProtectData ──────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc`. Call [`setup`](Self::setup) once to
/// authenticate and load the first snapshot; polling starts when the
/// first subscriber registers and stops when the last one leaves.
#[derive(Clone)]
pub struct ProtectData {
    inner: Arc<Inner>,
}

struct Inner {
    config: NvrConfig,
    client: Arc<ProtectClient>,
    store: Mutex<DeviceStore>,
    subscribers: Mutex<SubscriberRegistry>,
    /// Serializes refreshes. Forced refreshes queue on it; scheduled
    /// refreshes skip their turn when it is already held.
    refresh_gate: AsyncMutex<()>,
    /// Bumped by `stop()`; a refresh that started under an older value
    /// discards its results instead of writing them.
    generation: AtomicU64,
    stopped: AtomicBool,
    last_update_success: AtomicBool,
    /// Tracks whether the last refresh failure was already logged, so a
    /// flapping NVR produces one error line per outage, not one per poll.
    failure_logged: AtomicBool,
    state_tx: watch::Sender<CoordinatorState>,
    reauth_tx: watch::Sender<bool>,
    cancel: CancellationToken,
    poll_cancel: Mutex<Option<CancellationToken>>,
    websocket: Mutex<Option<WebSocketHandle>>,
}

struct SubscriberRegistry {
    next_id: u64,
    entries: Vec<Subscriber>,
}

struct Subscriber {
    handle: SubscriptionHandle,
    device_id: String,
    callback: UpdateCallback,
}

impl ProtectData {
    /// Create a coordinator from configuration. Does NOT connect --
    /// call [`setup()`](Self::setup) to authenticate and load data.
    pub fn new(config: NvrConfig) -> Result<Self, CoreError> {
        let base_url = config.base_url().map_err(|e| CoreError::Config {
            message: format!("invalid NVR address: {e}"),
        })?;
        let transport = TransportConfig {
            tls: tls_to_transport(&config.tls),
            timeout: config.timeout,
            cookie_jar: None,
        };
        let client = ProtectClient::new(
            base_url,
            config.username.clone(),
            config.password.clone(),
            &transport,
        )?;
        let (state_tx, _) = watch::channel(CoordinatorState::Stopped);
        let (reauth_tx, _) = watch::channel(false);

        Ok(Self {
            inner: Arc::new(Inner {
                store: Mutex::new(DeviceStore::new(config.minimum_score)),
                config,
                client: Arc::new(client),
                subscribers: Mutex::new(SubscriberRegistry {
                    next_id: 0,
                    entries: Vec::new(),
                }),
                refresh_gate: AsyncMutex::new(()),
                generation: AtomicU64::new(0),
                stopped: AtomicBool::new(false),
                last_update_success: AtomicBool::new(false),
                failure_logged: AtomicBool::new(false),
                state_tx,
                reauth_tx,
                cancel: CancellationToken::new(),
                poll_cancel: Mutex::new(None),
                websocket: Mutex::new(None),
            }),
        })
    }

    /// Access the raw API client.
    pub fn client(&self) -> &Arc<ProtectClient> {
        &self.inner.client
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Authenticate and perform the initial data load.
    ///
    /// An authentication failure stops the coordinator and raises the
    /// re-auth signal; there is no point retrying with the same
    /// credentials. Any other failure leaves the coordinator schedulable
    /// so the poll loop can recover once the NVR comes back.
    pub async fn setup(&self) -> Result<(), CoreError> {
        let _ = self.inner.state_tx.send(CoordinatorState::Starting);
        self.inner.client.ensure_authenticated().await.map_err(|e| {
            let err = CoreError::from(e);
            if err.requires_reauth() {
                self.fail_authentication();
            }
            err
        })?;

        if self.inner.config.websocket_enabled {
            self.start_websocket()?;
        }

        let result = self.refresh(true).await;
        if !self.inner.stopped.load(Ordering::SeqCst) {
            let _ = self.inner.state_tx.send(CoordinatorState::Running);
        }
        result
    }

    /// Stop the coordinator. Idempotent.
    ///
    /// Cancels the poll loop and the WebSocket task, and bumps the
    /// generation so an in-flight refresh discards its results.
    pub fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.cancel.cancel();

        if let Some(token) = self
            .inner
            .poll_cancel
            .lock()
            .expect("poll token poisoned")
            .take()
        {
            token.cancel();
        }
        if let Some(ws) = self
            .inner
            .websocket
            .lock()
            .expect("websocket handle poisoned")
            .take()
        {
            ws.shutdown();
        }
        let _ = self.inner.state_tx.send(CoordinatorState::Stopped);
        debug!("coordinator stopped");
    }

    /// Observe lifecycle transitions.
    pub fn state(&self) -> watch::Receiver<CoordinatorState> {
        self.inner.state_tx.subscribe()
    }

    /// Whether the most recent refresh completed successfully.
    ///
    /// Starts `false`; the first successful refresh flips it.
    pub fn last_update_success(&self) -> bool {
        self.inner.last_update_success.load(Ordering::SeqCst)
    }

    /// Observe the re-authentication signal. Flips to `true` once the
    /// NVR rejects the stored credentials.
    pub fn reauth_required(&self) -> watch::Receiver<bool> {
        self.inner.reauth_tx.subscribe()
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Fetch the bootstrap snapshot and recent motion events, merge them
    /// into the store, and notify subscribers of every changed device.
    ///
    /// `force` waits for any in-flight refresh to finish and then runs
    /// unconditionally; a scheduled (`force == false`) refresh returns
    /// immediately when one is already running.
    pub async fn refresh(&self, force: bool) -> Result<(), CoreError> {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return Err(CoreError::Stopped);
        }

        let _gate = if force {
            self.inner.refresh_gate.lock().await
        } else {
            match self.inner.refresh_gate.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    debug!("refresh already in flight, skipping");
                    return Ok(());
                }
            }
        };

        let generation = self.inner.generation.load(Ordering::SeqCst);
        let result = self.fetch_and_merge(generation).await;

        match result {
            Ok(changed) => {
                self.inner.last_update_success.store(true, Ordering::SeqCst);
                if self.inner.failure_logged.swap(false, Ordering::SeqCst) {
                    info!("NVR connection restored");
                }
                for id in changed {
                    self.signal(&id);
                }
                Ok(())
            }
            Err(err) => {
                self.inner
                    .last_update_success
                    .store(false, Ordering::SeqCst);
                if err.requires_reauth() {
                    self.fail_authentication();
                } else if !self.inner.failure_logged.swap(true, Ordering::SeqCst) {
                    warn!(error = %err, "refresh failed");
                }
                Err(err)
            }
        }
    }

    async fn fetch_and_merge(&self, generation: u64) -> Result<Vec<String>, CoreError> {
        self.inner.client.ensure_authenticated().await?;

        let (bootstrap, events) = tokio::join!(
            self.inner.client.bootstrap(),
            self.inner.client.motion_events(EVENT_LOOKBACK_SECS),
        );
        let bootstrap = bootstrap?;
        let events = events?;

        // A stop() while the fetch was on the wire wins; drop the results.
        if self.inner.generation.load(Ordering::SeqCst) != generation {
            return Err(CoreError::Stopped);
        }

        let mut store = self.inner.store.lock().expect("device store poisoned");
        let mut changed = store.apply_bootstrap(&bootstrap);
        for record in &events {
            if let Some(event) = convert::motion_event(record) {
                if let Some(id) = store.apply_motion_event(&event) {
                    if !changed.contains(&id) {
                        changed.push(id);
                    }
                }
            }
        }
        debug!(
            devices = store.len(),
            changed = changed.len(),
            "refresh merged"
        );
        Ok(changed)
    }

    /// Authentication was rejected: stop polling and raise the signal.
    fn fail_authentication(&self) {
        warn!("NVR rejected credentials, re-authentication required");
        self.inner
            .last_update_success
            .store(false, Ordering::SeqCst);
        self.stop();
        let _ = self.inner.reauth_tx.send(true);
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Register a callback for changes to one device.
    ///
    /// The first subscriber starts the poll loop; it runs until the last
    /// subscriber leaves or the coordinator stops.
    pub fn subscribe(
        &self,
        device_id: impl Into<String>,
        callback: UpdateCallback,
    ) -> SubscriptionHandle {
        let handle = {
            let mut registry = self.inner.subscribers.lock().expect("registry poisoned");
            registry.next_id += 1;
            let handle = SubscriptionHandle(registry.next_id);
            registry.entries.push(Subscriber {
                handle,
                device_id: device_id.into(),
                callback,
            });
            handle
        };
        self.ensure_polling();
        handle
    }

    /// Remove a subscription. The poll loop stops with the last one.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        let now_empty = {
            let mut registry = self.inner.subscribers.lock().expect("registry poisoned");
            registry.entries.retain(|s| s.handle != handle);
            registry.entries.is_empty()
        };
        if now_empty {
            if let Some(token) = self
                .inner
                .poll_cancel
                .lock()
                .expect("poll token poisoned")
                .take()
            {
                debug!("last subscriber left, stopping poll loop");
                token.cancel();
            }
        }
    }

    /// Invoke every callback registered for `device_id` with the current
    /// device state. Callbacks run outside the locks, so a callback may
    /// itself subscribe or unsubscribe.
    ///
    /// Callbacks take a `&Device`, so a signal for an id no longer in
    /// the store has nothing to deliver and is dropped silently.
    pub fn signal(&self, device_id: &str) {
        let Some(device) = self.device(device_id) else {
            return;
        };
        let callbacks: Vec<UpdateCallback> = {
            let registry = self.inner.subscribers.lock().expect("registry poisoned");
            registry
                .entries
                .iter()
                .filter(|s| s.device_id == device_id)
                .map(|s| Arc::clone(&s.callback))
                .collect()
        };
        for callback in callbacks {
            callback(&device);
        }
    }

    /// Start the poll loop if it is not already running.
    fn ensure_polling(&self) {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return;
        }
        let mut slot = self
            .inner
            .poll_cancel
            .lock()
            .expect("poll token poisoned");
        if slot.is_some() {
            return;
        }
        let token = self.inner.cancel.child_token();
        *slot = Some(token.clone());
        drop(slot);

        let coordinator = self.clone();
        let interval = self.inner.config.scan_interval;
        debug!(?interval, "first subscriber, starting poll loop");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await; // consume the immediate first tick

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        // refresh() logs its own failures; keep polling
                        // unless the coordinator stopped underneath us.
                        let _ = coordinator.refresh(false).await;
                        if coordinator.inner.stopped.load(Ordering::SeqCst) {
                            break;
                        }
                    }
                }
            }
        });
    }

    // ── Device accessors ─────────────────────────────────────────────

    pub fn device(&self, id: &str) -> Option<Device> {
        self.inner
            .store
            .lock()
            .expect("device store poisoned")
            .get(id)
            .cloned()
    }

    pub fn devices_by_kind(&self, kinds: &[DeviceKind]) -> Vec<Device> {
        self.inner
            .store
            .lock()
            .expect("device store poisoned")
            .get_by_kinds(kinds)
    }

    // ── Control operations ───────────────────────────────────────────

    /// Set a camera's recording mode, recording the confirmed value.
    pub async fn set_recording_mode(
        &self,
        camera_id: &str,
        mode: RecordingMode,
    ) -> Result<(), CoreError> {
        self.inner
            .client
            .set_recording_mode(camera_id, mode.as_wire())
            .await?;
        self.update_camera(camera_id, |camera| camera.recording_mode = Some(mode))
    }

    /// Set a camera's infrared LED mode, recording the confirmed value.
    pub async fn set_ir_mode(&self, camera_id: &str, mode: IrMode) -> Result<(), CoreError> {
        self.inner
            .client
            .set_ir_mode(camera_id, mode.as_wire())
            .await?;
        self.update_camera(camera_id, |camera| camera.ir_mode = Some(mode))
    }

    pub async fn set_wdr_level(&self, camera_id: &str, level: i64) -> Result<(), CoreError> {
        self.inner.client.set_wdr_level(camera_id, level).await?;
        self.update_camera(camera_id, |camera| camera.wdr_level = Some(level))
    }

    pub async fn set_mic_volume(&self, camera_id: &str, volume: i64) -> Result<(), CoreError> {
        self.inner.client.set_mic_volume(camera_id, volume).await?;
        self.update_camera(camera_id, |camera| camera.mic_volume = Some(volume))
    }

    pub async fn set_zoom_position(&self, camera_id: &str, position: i64) -> Result<(), CoreError> {
        self.inner
            .client
            .set_zoom_position(camera_id, position)
            .await?;
        self.update_camera(camera_id, |camera| camera.zoom_position = Some(position))
    }

    /// Fetch a live snapshot, sized by camera generation: G4-class
    /// hardware gets 720p, everything older gets 576p.
    pub async fn snapshot(&self, camera_id: &str) -> Result<Bytes, CoreError> {
        let model = self
            .device(camera_id)
            .ok_or_else(|| CoreError::DeviceNotFound {
                device_id: camera_id.to_owned(),
            })?
            .model;
        let (width, height) = snapshot_dimensions(model.as_deref());
        Ok(self.inner.client.snapshot(camera_id, width, height).await?)
    }

    /// Fetch the thumbnail image of a camera's last motion event, if the
    /// event carried one.
    pub async fn motion_thumbnail(
        &self,
        camera_id: &str,
        width: u32,
    ) -> Result<Option<Bytes>, CoreError> {
        let thumbnail_id = self
            .device(camera_id)
            .ok_or_else(|| CoreError::DeviceNotFound {
                device_id: camera_id.to_owned(),
            })?
            .camera()
            .and_then(|c| c.motion.thumbnail.clone());
        match thumbnail_id {
            Some(id) => Ok(Some(self.inner.client.thumbnail(&id, width).await?)),
            None => Ok(None),
        }
    }

    /// Apply a confirmed control value to the stored camera and signal.
    fn update_camera(
        &self,
        camera_id: &str,
        mutate: impl FnOnce(&mut crate::model::CameraState),
    ) -> Result<(), CoreError> {
        {
            let mut store = self.inner.store.lock().expect("device store poisoned");
            let device = store
                .get_mut(camera_id)
                .ok_or_else(|| CoreError::DeviceNotFound {
                    device_id: camera_id.to_owned(),
                })?;
            let camera = device
                .camera_mut()
                .ok_or_else(|| CoreError::DeviceNotFound {
                    device_id: camera_id.to_owned(),
                })?;
            mutate(camera);
        }
        self.signal(camera_id);
        Ok(())
    }

    // ── WebSocket push channel ───────────────────────────────────────

    fn start_websocket(&self) -> Result<(), CoreError> {
        let ws_url = self.inner.client.updates_ws_url()?;
        let handle = WebSocketHandle::connect(
            ws_url,
            ReconnectConfig::default(),
            self.inner.cancel.child_token(),
            self.inner.client.session_cookie(),
        );
        let mut events = handle.subscribe();
        *self
            .inner
            .websocket
            .lock()
            .expect("websocket handle poisoned") = Some(handle);

        let coordinator = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = coordinator.inner.cancel.cancelled() => break,
                    record = events.recv() => {
                        match record {
                            Ok(record) => coordinator.apply_push_event(&record),
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                                warn!(missed = n, "push stream lagged");
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
        });
        Ok(())
    }

    /// Merge one pushed motion event and signal the affected camera.
    fn apply_push_event(&self, record: &protect_api::models::MotionEventRecord) {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return;
        }
        let Some(event) = convert::motion_event(record) else {
            return;
        };
        let changed = self
            .inner
            .store
            .lock()
            .expect("device store poisoned")
            .apply_motion_event(&event);
        if let Some(id) = changed {
            self.signal(&id);
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}

fn snapshot_dimensions(model: Option<&str>) -> (u32, u32) {
    if model.is_some_and(|m| m.contains("G4")) {
        SNAPSHOT_HD
    } else {
        SNAPSHOT_SD
    }
}
