//! Resolved caller identity shared across the authentication subsystem.

use serde::{Deserialize, Serialize};

/// Which credential scheme authenticated the request.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// Telegram Mini App initData header.
    #[serde(rename = "initdata")]
    InitData,
    /// Backend-issued signed session token.
    #[serde(rename = "session-token")]
    SessionToken,
    /// External identity-provider token verified out of process.
    #[serde(rename = "external-jwt")]
    ExternalJwt,
}

/// The resolved identity for one request.
///
/// Constructed fresh per request by the auth gate, carried in request
/// extensions, and dropped when the request ends. `id` is the internal
/// numeric user id every identity check compares against.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub telegram_id: Option<i64>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub language_code: Option<String>,
    pub is_premium: Option<bool>,
    pub auth_method: AuthMethod,
}
