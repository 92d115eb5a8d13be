// Protect NVR HTTP client
//
// Wraps `reqwest::Client` with platform-aware URL construction, credential
// attachment, and uniform status translation. Endpoint families (bootstrap,
// events, cameras) are implemented as inherent methods via separate files
// to keep this module focused on transport and session mechanics.

use std::sync::Mutex;

use chrono::Utc;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::auth::{Credential, NvrPlatform};
use crate::error::Error;
use crate::transport::TransportConfig;

/// Raw HTTP client for the UniFi Protect NVR API.
///
/// Owns the session: platform flavor (probed once and cached), credential
/// material, and the cookie jar. Never retries a request -- retry policy
/// belongs to the update coordinator above this crate.
pub struct ProtectClient {
    base_url: Url,
    username: String,
    password: SecretString,
    transport: TransportConfig,
    /// Swapped for a fresh client (and cookie jar) when the modern flavor
    /// re-authenticates -- the login endpoint rejects stale session cookies.
    http: Mutex<reqwest::Client>,
    state: Mutex<SessionState>,
}

#[derive(Default)]
struct SessionState {
    platform: Option<NvrPlatform>,
    credential: Option<Credential>,
    authenticated: bool,
    /// `TOKEN=...` cookie pair from the modern login response, kept for
    /// the WebSocket upgrade request (tungstenite has no cookie jar).
    session_cookie: Option<String>,
}

impl ProtectClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// If the config doesn't already include a cookie jar, one is created
    /// automatically (the modern flavor tracks its session in a cookie).
    /// `base_url` is the NVR root, e.g. `https://192.168.1.1:443`.
    pub fn new(
        base_url: Url,
        username: impl Into<String>,
        password: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let http = config.build_client()?;

        Ok(Self {
            base_url,
            username: username.into(),
            password,
            transport: config,
            http: Mutex::new(http),
            state: Mutex::new(SessionState::default()),
        })
    }

    /// The NVR base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The detected platform flavor, if the probe has run.
    pub fn platform(&self) -> Option<NvrPlatform> {
        self.state.lock().expect("session state poisoned").platform
    }

    // ── Platform detection ───────────────────────────────────────────

    /// Detect the platform flavor of the NVR.
    ///
    /// Issues one unauthenticated request to the base URL without
    /// following redirects: a `x-csrf-token` response header means a
    /// UniFi OS gateway fronts the API, otherwise the NVR speaks the
    /// standalone flavor. The result is cached -- the probe runs at most
    /// once per client lifetime.
    pub async fn detect_platform(&self) -> Result<NvrPlatform, Error> {
        if let Some(platform) = self.platform() {
            return Ok(platform);
        }

        let probe = self.transport.build_probe_client()?;
        debug!(url = %self.base_url, "probing platform flavor");

        let resp = probe
            .get(self.base_url.clone())
            .send()
            .await
            .map_err(Error::Transport)?;

        let platform = if resp.headers().contains_key("x-csrf-token") {
            NvrPlatform::UnifiOs
        } else {
            NvrPlatform::Standalone
        };
        debug!(?platform, "detected platform flavor");

        self.state.lock().expect("session state poisoned").platform = Some(platform);
        Ok(platform)
    }

    // ── Authentication ───────────────────────────────────────────────

    /// Authenticate with the NVR using the configured credentials.
    ///
    /// On the modern flavor, stale cookie state is cleared first (fresh
    /// cookie jar) and the CSRF token is captured from the response
    /// headers. On the standalone flavor, the bearer token comes from the
    /// `Authorization` response header.
    pub async fn login(&self) -> Result<(), Error> {
        let platform = self.detect_platform().await?;

        if platform == NvrPlatform::UnifiOs {
            self.reset_session()?;
        }

        let url = self.base_url.join(platform.login_path())?;
        debug!(url = %url, "logging in");

        let body = serde_json::json!({
            "username": self.username,
            "password": self.password.expose_secret(),
            "remember": true,
        });

        let resp = self
            .execute(Method::POST, url.clone(), Some(&body))
            .await?;

        let session_cookie = session_cookie_value(&resp);
        let credential = match platform {
            NvrPlatform::UnifiOs => {
                let token = header_value(&resp, "x-csrf-token").ok_or_else(|| {
                    Error::Authentication {
                        message: "login response missing x-csrf-token header".into(),
                    }
                })?;
                Credential::Csrf { token }
            }
            NvrPlatform::Standalone => {
                let token = header_value(&resp, "Authorization").ok_or_else(|| {
                    Error::Authentication {
                        message: "login response missing Authorization header".into(),
                    }
                })?;
                Credential::Bearer { token }
            }
        };

        let mut state = self.state.lock().expect("session state poisoned");
        state.credential = Some(credential);
        state.session_cookie = session_cookie;
        state.authenticated = true;
        debug!("authenticated successfully");
        Ok(())
    }

    /// The `TOKEN` session cookie captured at login, if any.
    pub fn session_cookie(&self) -> Option<String> {
        self.state
            .lock()
            .expect("session state poisoned")
            .session_cookie
            .clone()
    }

    /// Whether the stored session is currently valid.
    ///
    /// Purely local: checks the authenticated flag and, on the modern
    /// flavor, lazily decodes the token's expiry. Never performs network
    /// I/O -- an expired or malformed token simply reads as `false`.
    pub fn is_authenticated(&self) -> bool {
        let state = self.state.lock().expect("session state poisoned");
        if !state.authenticated {
            return false;
        }
        match &state.credential {
            Some(credential) => {
                let expired = credential.is_expired(Utc::now());
                if expired {
                    debug!("session token has expired");
                }
                !expired
            }
            None => false,
        }
    }

    /// Log in only if the current session is missing or expired.
    ///
    /// Every data-fetching method calls this before issuing its request.
    pub async fn ensure_authenticated(&self) -> Result<(), Error> {
        if !self.is_authenticated() {
            self.login().await?;
        }
        Ok(())
    }

    /// Drop all session state, returning the client to unauthenticated.
    pub fn invalidate_session(&self) {
        let mut state = self.state.lock().expect("session state poisoned");
        state.credential = None;
        state.session_cookie = None;
        state.authenticated = false;
    }

    /// Rebuild the HTTP client with a fresh cookie jar.
    fn reset_session(&self) -> Result<(), Error> {
        let config = self.transport.clone().with_cookie_jar();
        let fresh = config.build_client()?;
        *self.http.lock().expect("http client poisoned") = fresh;

        let mut state = self.state.lock().expect("session state poisoned");
        state.credential = None;
        state.session_cookie = None;
        state.authenticated = false;
        Ok(())
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a full URL for a Protect API path, platform prefix applied.
    ///
    /// Requires the platform to be known; callers go through
    /// [`ensure_authenticated`](Self::ensure_authenticated) first, which
    /// runs the probe as a side effect.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let platform = self.platform().ok_or_else(|| Error::Nvr {
            status: 0,
            message: "platform not yet detected".into(),
        })?;
        let full = format!(
            "{}/{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            platform.api_prefix(),
            path
        );
        Url::parse(&full).map_err(Error::InvalidUrl)
    }

    /// WebSocket endpoint for the live update stream, scheme adjusted.
    pub fn updates_ws_url(&self) -> Result<Url, Error> {
        let mut url = self.api_url("ws/updates")?;
        let scheme = if url.scheme() == "http" { "ws" } else { "wss" };
        url.set_scheme(scheme)
            .map_err(|()| Error::WebSocketConnect("url scheme rejected".into()))?;
        Ok(url)
    }

    // ── Request core ─────────────────────────────────────────────────

    /// Perform a request with the active credential attached and translate
    /// the response status uniformly:
    /// 401/403 → `Authentication` (and the session is invalidated),
    /// 404 → `NotFound`, other non-2xx → `Nvr`, connection-level failure
    /// → `Transport`. Success returns the raw response for the caller.
    pub(crate) async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, Error> {
        let http = self.http.lock().expect("http client poisoned").clone();
        debug!(%method, %url, "request");

        let mut request = http.request(method, url.clone());
        let credential = {
            let state = self.state.lock().expect("session state poisoned");
            state.credential.clone()
        };
        if let Some(ref credential) = credential {
            let (name, value) = credential.header();
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let resp = request.send().await.map_err(Error::Transport)?;
        let status = resp.status();
        debug!(status = status.as_u16(), %url, "response");

        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            self.invalidate_session();
            return Err(Error::Authentication {
                message: format!(
                    "NVR reported authorization failure on {}: HTTP {}",
                    url.path(),
                    status.as_u16()
                ),
            });
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound {
                path: url.path().to_owned(),
            });
        }

        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(Error::Nvr {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp)
    }

    /// GET a JSON payload from an API path (auth ensured by the caller).
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        let resp = self.execute(Method::GET, url, None).await?;
        let body = resp.text().await.map_err(Error::Transport)?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    /// PATCH a JSON body against an API path, discarding the response.
    pub(crate) async fn patch_json(
        &self,
        url: Url,
        body: &serde_json::Value,
    ) -> Result<(), Error> {
        self.execute(Method::PATCH, url, Some(body)).await?;
        Ok(())
    }
}

/// Read a response header as an owned string, if present and valid UTF-8.
fn header_value(resp: &reqwest::Response, name: &str) -> Option<String> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// Extract the `TOKEN=...` pair from the login response's Set-Cookie headers.
fn session_cookie_value(resp: &reqwest::Response) -> Option<String> {
    resp.headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("TOKEN="))
        .map(|v| v.split(';').next().unwrap_or(v).to_owned())
}
