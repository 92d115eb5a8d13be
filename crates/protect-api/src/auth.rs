// NVR platform detection and credential handling.
//
// The credential a login produces depends on the platform flavor:
// UniFi OS gateways hand back a CSRF token (itself a JWT carrying an
// expiry), standalone NVRs hand back a bearer token with no expiry
// material on the wire. Both live behind one tagged union so call sites
// never branch on flavor themselves.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// The platform flavor of the NVR firmware.
///
/// Determines the API path prefix, the login endpoint, and which
/// credential the login response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NvrPlatform {
    /// UniFi OS console (UDM Pro, UNVR, ...) -- Protect is proxied
    /// behind the gateway and auth is CSRF-token + session cookie.
    UnifiOs,
    /// Standalone Protect NVR (CloudKey Gen2 on old firmware) --
    /// direct API with bearer-token auth.
    Standalone,
}

impl NvrPlatform {
    /// The API path prefix for Protect endpoints (no leading slash).
    pub fn api_prefix(&self) -> &'static str {
        match self {
            Self::UnifiOs => "proxy/protect/api",
            Self::Standalone => "api",
        }
    }

    /// The login endpoint path.
    pub fn login_path(&self) -> &'static str {
        match self {
            Self::UnifiOs => "/api/auth/login",
            Self::Standalone => "/api/auth",
        }
    }
}

/// Credential material produced by a successful login.
///
/// Exactly one representation is active at a time, selected by the
/// platform flavor. Expiry strategy is per-variant: the CSRF token is a
/// JWT whose `exp` claim is checked lazily; the bearer token carries no
/// expiry and stays valid until the NVR rejects it.
#[derive(Debug, Clone)]
pub enum Credential {
    /// UniFi OS: `x-csrf-token` request header (session cookie rides in
    /// the client's cookie jar).
    Csrf { token: String },
    /// Standalone: `Authorization: Bearer ...` request header.
    Bearer { token: String },
}

impl Credential {
    /// The request header this credential attaches to every call.
    pub fn header(&self) -> (&'static str, String) {
        match self {
            Self::Csrf { token } => ("x-csrf-token", token.clone()),
            Self::Bearer { token } => ("Authorization", format!("Bearer {token}")),
        }
    }

    /// Whether this credential is past its expiry as of `now`.
    ///
    /// Purely local, no network I/O. A malformed token counts as
    /// expired rather than propagating a decode error, so a broken
    /// credential simply forces the next login.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self {
            Self::Bearer { .. } => false,
            Self::Csrf { token } => match decode_expiry(token) {
                Ok(Some(exp)) => exp <= now,
                Ok(None) => false,
                Err(_) => true,
            },
        }
    }
}

/// Failure to decode a JWT payload.
#[derive(Debug, Error)]
#[error("invalid token: {0}")]
pub struct TokenDecodeError(String);

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    exp: Option<i64>,
}

/// Decode the `exp` claim of a JWT without verifying its signature.
///
/// The NVR signs its tokens with a key we never see; only the expiry
/// instant matters for the local liveness check.
pub fn decode_expiry(token: &str) -> Result<Option<DateTime<Utc>>, TokenDecodeError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| TokenDecodeError("not a JWT".into()))?;

    let raw = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| TokenDecodeError(format!("payload is not base64url: {e}")))?;

    let claims: Claims = serde_json::from_slice(&raw)
        .map_err(|e| TokenDecodeError(format!("payload is not JSON: {e}")))?;

    Ok(claims
        .exp
        .and_then(|secs| DateTime::from_timestamp(secs, 0)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn jwt_with_exp(exp: Option<i64>) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = match exp {
            Some(e) => URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{e}}}"#)),
            None => URL_SAFE_NO_PAD.encode(b"{}"),
        };
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn csrf_token_expires_at_exp() {
        let now = Utc::now();
        let exp = (now + Duration::hours(1)).timestamp();
        let cred = Credential::Csrf {
            token: jwt_with_exp(Some(exp)),
        };

        assert!(!cred.is_expired(now));
        assert!(cred.is_expired(now + Duration::hours(2)));
    }

    #[test]
    fn csrf_token_without_exp_never_expires() {
        let cred = Credential::Csrf {
            token: jwt_with_exp(None),
        };
        assert!(!cred.is_expired(Utc::now()));
    }

    #[test]
    fn malformed_csrf_token_counts_as_expired() {
        let cred = Credential::Csrf {
            token: "definitely-not-a-jwt".into(),
        };
        assert!(cred.is_expired(Utc::now()));
    }

    #[test]
    fn bearer_token_has_no_local_expiry() {
        let cred = Credential::Bearer {
            token: "opaque".into(),
        };
        assert!(!cred.is_expired(Utc::now() + Duration::days(365)));
    }

    #[test]
    fn decode_expiry_rejects_non_jwt() {
        assert!(decode_expiry("no-dots-here").is_err());
    }

    #[test]
    fn header_selection_follows_variant() {
        let csrf = Credential::Csrf { token: "t".into() };
        assert_eq!(csrf.header(), ("x-csrf-token", "t".to_owned()));

        let bearer = Credential::Bearer { token: "t".into() };
        assert_eq!(bearer.header(), ("Authorization", "Bearer t".to_owned()));
    }
}
