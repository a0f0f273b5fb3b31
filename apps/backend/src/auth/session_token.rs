//! Backend-issued stateless session tokens.
//!
//! Wire format: `base64url(json_payload) + "." + hex(HMAC-SHA256(payload_b64,
//! secret))`. Tokens are self-verifying and cannot be revoked before expiry;
//! a new token is a new value.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::auth::claims::{AuthMethod, AuthenticatedUser};
use crate::error::AppError;
use crate::state::auth_config::AuthConfig;

type HmacSha256 = Hmac<Sha256>;

/// Default session lifetime: 30 days.
pub const SESSION_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;

const TOKEN_TYPE: &str = "telegram";

/// Signed session-token payload. `user_id` is the internal id, `telegram_id`
/// the external Telegram id the session was bootstrapped from.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionTokenPayload {
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub telegram_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(rename = "type", default)]
    pub token_type: String,
    /// Issued-at (seconds since epoch)
    #[serde(default)]
    pub iat: i64,
    /// Expiry (seconds since epoch)
    #[serde(default)]
    pub exp: i64,
}

/// A freshly issued token together with its expiry timestamp.
#[derive(Debug, Serialize, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: i64,
}

fn sign_payload(payload_b64: &str, secret: &[u8]) -> Result<Vec<u8>, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::internal(format!("invalid HMAC key: {e}")))?;
    mac.update(payload_b64.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

fn unix_seconds(now: SystemTime) -> Result<i64, AppError> {
    Ok(now
        .duration_since(UNIX_EPOCH)
        .map_err(|_| AppError::internal("failed to get current time".to_string()))?
        .as_secs() as i64)
}

/// Mint a signed session token for the given user.
///
/// Fails with a configuration error when no session secret is available.
/// `ttl_seconds` defaults to [`SESSION_TTL_SECONDS`] when not supplied.
pub fn issue(
    config: &AuthConfig,
    user_id: i64,
    telegram_id: i64,
    username: Option<&str>,
    first_name: Option<&str>,
    ttl_seconds: Option<i64>,
    now: SystemTime,
) -> Result<IssuedSession, AppError> {
    let secret = config.session_secret().ok_or_else(|| {
        AppError::config("AUTH_SESSION_SECRET (or TELEGRAM_BOT_TOKEN) is required".to_string())
    })?;

    let iat = unix_seconds(now)?;
    let exp = iat + ttl_seconds.unwrap_or(SESSION_TTL_SECONDS);

    let payload = SessionTokenPayload {
        user_id,
        telegram_id,
        username: username.map(str::to_string),
        first_name: first_name.map(str::to_string),
        token_type: TOKEN_TYPE.to_string(),
        iat,
        exp,
    };

    let payload_json = serde_json::to_vec(&payload)
        .map_err(|e| AppError::internal(format!("failed to encode session payload: {e}")))?;
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload_json);
    let signature = hex::encode(sign_payload(&payload_b64, secret)?);

    Ok(IssuedSession {
        token: format!("{payload_b64}.{signature}"),
        expires_at: exp,
    })
}

/// Verify a session token and return the identity it binds.
///
/// Fails closed: any malformed, mis-signed, mistyped or expired token yields
/// None, with the cause logged. Pure function of secret, input and clock.
pub fn verify(config: &AuthConfig, token: &str, now: SystemTime) -> Option<AuthenticatedUser> {
    let secret = config.session_secret()?;
    if token.is_empty() {
        return None;
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 2 {
        debug!("session token rejected: wrong part count");
        return None;
    }
    let (payload_b64, signature_hex) = (parts[0], parts[1]);

    let expected = sign_payload(payload_b64, secret).ok()?;
    let provided = match hex::decode(signature_hex) {
        Ok(bytes) => bytes,
        Err(_) => {
            debug!("session token rejected: signature is not hex");
            return None;
        }
    };
    // Constant-time comparison; slice ct_eq is false on length mismatch.
    if !bool::from(expected.ct_eq(&provided)) {
        warn!("session token rejected: signature mismatch");
        return None;
    }

    let payload_json = URL_SAFE_NO_PAD.decode(payload_b64).ok().or_else(|| {
        debug!("session token rejected: payload is not base64url");
        None
    })?;
    let payload: SessionTokenPayload = serde_json::from_slice(&payload_json).ok().or_else(|| {
        debug!("session token rejected: payload is not valid JSON");
        None
    })?;

    if payload.token_type != TOKEN_TYPE {
        debug!("session token rejected: wrong type tag");
        return None;
    }
    if payload.user_id <= 0 || payload.telegram_id <= 0 {
        debug!("session token rejected: missing user ids");
        return None;
    }
    let now_secs = unix_seconds(now).ok()?;
    if payload.exp <= 0 || payload.exp < now_secs {
        debug!("session token rejected: expired");
        return None;
    }

    Some(AuthenticatedUser {
        id: payload.user_id,
        telegram_id: Some(payload.telegram_id),
        username: payload.username,
        first_name: payload.first_name,
        last_name: None,
        language_code: None,
        is_premium: None,
        auth_method: AuthMethod::SessionToken,
    })
}
