// Per-camera endpoints
//
// Settings mutations (`PATCH /cameras/{id}`) and image retrieval
// (snapshot, thumbnail). Image endpoints on the standalone flavor need a
// short-lived access key; the modern flavor accepts an empty one.

use bytes::Bytes;
use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tracing::debug;

use crate::auth::NvrPlatform;
use crate::client::ProtectClient;
use crate::error::Error;
use crate::models::AccessKeyResponse;

impl ProtectClient {
    // ── Settings ─────────────────────────────────────────────────────

    /// Set the recording mode of a camera.
    ///
    /// `mode` is the wire value: `never`, `motion`, or `always`.
    pub async fn set_recording_mode(&self, camera_id: &str, mode: &str) -> Result<(), Error> {
        self.ensure_authenticated().await?;

        let url = self.api_url(&format!("cameras/{camera_id}"))?;
        debug!(camera_id, mode, "setting recording mode");
        self.patch_json(
            url,
            &json!({
                "recordingSettings": {
                    "mode": mode,
                    "prePaddingSecs": 2,
                    "postPaddingSecs": 2,
                    "minMotionEventTrigger": 1000,
                    "enablePirTimelapse": false,
                }
            }),
        )
        .await
    }

    /// Set the infrared LED mode of a camera.
    ///
    /// Accepts the wire values `auto`, `on`, `autoFilterOnly`, `off` as
    /// well as the host-facing aliases `led_off`, `always_on`,
    /// `always_off`.
    pub async fn set_ir_mode(&self, camera_id: &str, mode: &str) -> Result<(), Error> {
        self.ensure_authenticated().await?;

        let wire_mode = match mode {
            "led_off" => "autoFilterOnly",
            "always_on" => "on",
            "always_off" => "off",
            other => other,
        };

        let url = self.api_url(&format!("cameras/{camera_id}"))?;
        debug!(camera_id, wire_mode, "setting IR mode");
        self.patch_json(
            url,
            &json!({
                "ispSettings": { "irLedMode": wire_mode, "irLedLevel": 255 }
            }),
        )
        .await
    }

    /// Set the wide-dynamic-range level of a camera (0-3).
    pub async fn set_wdr_level(&self, camera_id: &str, level: i64) -> Result<(), Error> {
        self.ensure_authenticated().await?;

        let url = self.api_url(&format!("cameras/{camera_id}"))?;
        debug!(camera_id, level, "setting WDR level");
        self.patch_json(url, &json!({ "ispSettings": { "wdr": level } }))
            .await
    }

    /// Set the microphone sensitivity of a camera (0-100).
    pub async fn set_mic_volume(&self, camera_id: &str, volume: i64) -> Result<(), Error> {
        self.ensure_authenticated().await?;

        let url = self.api_url(&format!("cameras/{camera_id}"))?;
        debug!(camera_id, volume, "setting mic volume");
        self.patch_json(url, &json!({ "micVolume": volume })).await
    }

    /// Set the optical zoom position of a camera (0-100).
    pub async fn set_zoom_position(&self, camera_id: &str, position: i64) -> Result<(), Error> {
        self.ensure_authenticated().await?;

        let url = self.api_url(&format!("cameras/{camera_id}"))?;
        debug!(camera_id, position, "setting zoom position");
        self.patch_json(url, &json!({ "ispSettings": { "zoomPosition": position } }))
            .await
    }

    // ── Images ───────────────────────────────────────────────────────

    /// Fetch a live snapshot from a camera at the given resolution.
    ///
    /// `GET /{prefix}/cameras/{id}/snapshot?accessKey&w&h&ts`
    pub async fn snapshot(
        &self,
        camera_id: &str,
        width: u32,
        height: u32,
    ) -> Result<Bytes, Error> {
        self.ensure_authenticated().await?;
        let access_key = self.access_key().await?;

        let mut url = self.api_url(&format!("cameras/{camera_id}/snapshot"))?;
        url.query_pairs_mut()
            .append_pair("accessKey", &access_key)
            .append_pair("w", &width.to_string())
            .append_pair("h", &height.to_string())
            .append_pair("ts", &Utc::now().timestamp_millis().to_string());

        debug!(camera_id, width, height, "fetching snapshot");
        let resp = self.execute(Method::GET, url, None).await?;
        resp.bytes().await.map_err(Error::Transport)
    }

    /// Fetch a stored motion thumbnail by id, 16:9 at the given width.
    ///
    /// `GET /{prefix}/thumbnails/{id}?accessKey&w&h`
    pub async fn thumbnail(&self, thumbnail_id: &str, width: u32) -> Result<Bytes, Error> {
        self.ensure_authenticated().await?;
        let access_key = self.access_key().await?;

        let height = width * 9 / 16;
        let mut url = self.api_url(&format!("thumbnails/{thumbnail_id}"))?;
        url.query_pairs_mut()
            .append_pair("accessKey", &access_key)
            .append_pair("w", &width.to_string())
            .append_pair("h", &height.to_string());

        debug!(thumbnail_id, width, "fetching thumbnail");
        let resp = self.execute(Method::GET, url, None).await?;
        resp.bytes().await.map_err(Error::Transport)
    }

    /// Obtain the short-lived access key image endpoints require.
    ///
    /// The modern flavor authenticates image requests through the session
    /// itself and takes an empty key.
    async fn access_key(&self) -> Result<String, Error> {
        if self.platform() == Some(NvrPlatform::UnifiOs) {
            return Ok(String::new());
        }

        let url = self.api_url("auth/access-key")?;
        let resp = self.execute(Method::POST, url, None).await?;
        let body = resp.text().await.map_err(Error::Transport)?;
        let parsed: AccessKeyResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body,
            })?;
        Ok(parsed.access_key)
    }
}
