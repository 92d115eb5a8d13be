// ── Runtime connection configuration ──
//
// These types describe *how* to reach an NVR and how aggressively to
// poll it. They carry credential data and tuning knobs, but never touch
// disk -- the host platform constructs an `NvrConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// TLS verification strategy.
#[derive(Debug, Clone, Default)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification. Default -- NVRs ship self-signed certs.
    #[default]
    DangerAcceptInvalid,
}

impl PartialEq for TlsVerification {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::SystemDefaults, Self::SystemDefaults)
            | (Self::DangerAcceptInvalid, Self::DangerAcceptInvalid) => true,
            (Self::CustomCa(a), Self::CustomCa(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for TlsVerification {}

/// Configuration for connecting to a single NVR.
///
/// Built by the host, passed to [`ProtectData`](crate::ProtectData) --
/// core never reads config files.
#[derive(Debug, Clone)]
pub struct NvrConfig {
    /// NVR hostname or IP address.
    pub host: String,
    /// HTTPS port (443 on UniFi OS consoles, 7443 standalone).
    pub port: u16,
    /// Use HTTPS. Plain HTTP exists for local mock servers only.
    pub https: bool,
    /// Login username.
    pub username: String,
    /// Login password.
    pub password: SecretString,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
    /// Interval between periodic refreshes while subscribers exist.
    pub scan_interval: Duration,
    /// Motion events scoring below this are treated as no-motion.
    pub minimum_score: i64,
    /// Enable the WebSocket push channel.
    pub websocket_enabled: bool,
}

impl NvrConfig {
    /// The base URL for this NVR.
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        let scheme = if self.https { "https" } else { "http" };
        Url::parse(&format!("{scheme}://{}:{}", self.host, self.port))
    }
}

impl Default for NvrConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.1".into(),
            port: 443,
            https: true,
            username: "admin".into(),
            password: SecretString::from(String::new()),
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            scan_interval: Duration::from_secs(2),
            minimum_score: 0,
            websocket_enabled: true,
        }
    }
}
