// ── Core error types ──
//
// User-facing errors from protect-core. These are NOT API-specific --
// consumers never see HTTP status codes or JSON parse failures directly.
// The `From<protect_api::Error>` impl translates transport-layer errors
// into domain-appropriate variants, and the coordinator is the only
// component that decides retry vs fatal vs log-and-continue.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to NVR at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Coordinator is stopped")]
    Stopped,

    #[error("NVR connection timed out")]
    Timeout,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    #[error("Resource not found: {path}")]
    NotFound { path: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Operation rejected by NVR: {message}")]
    Rejected { message: String },

    #[error("NVR protocol error: {message}")]
    Protocol { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Whether this failure requires fresh credentials before anything
    /// else can proceed.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<protect_api::Error> for CoreError {
    fn from(err: protect_api::Error) -> Self {
        match err {
            protect_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            protect_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(|u| u.to_string())
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                }
            }
            protect_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            protect_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            protect_api::Error::NotFound { path } => CoreError::NotFound { path },
            protect_api::Error::Nvr { status, message } => CoreError::Rejected {
                message: format!("HTTP {status}: {message}"),
            },
            protect_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            protect_api::Error::Deserialization { message, body: _ } => {
                CoreError::Protocol { message }
            }
        }
    }
}
