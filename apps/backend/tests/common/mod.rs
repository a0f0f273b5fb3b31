#![allow(dead_code)]

use std::time::{SystemTime, UNIX_EPOCH};

use actix_web::web;
use backend::auth::session_token;
use backend::{AppState, AuthConfig};

/// Bot token shared by every fixture; initData blobs and session tokens are
/// both keyed off it, as in a deployment without a dedicated session secret.
pub const BOT_TOKEN: &str = "123456:TEST-BOT-TOKEN";

#[ctor::ctor]
fn init_test_logging() {
    backend_test_support::logging::init();
}

pub fn auth_config() -> AuthConfig {
    AuthConfig::new(BOT_TOKEN, None)
}

/// App state without an external identity provider: bearer tokens only
/// verify as backend session tokens.
pub fn test_state() -> web::Data<AppState> {
    web::Data::new(AppState::without_external(auth_config()))
}

pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock is past the epoch")
        .as_secs() as i64
}

/// Mint a valid session token for the given internal user id.
pub fn session_token_for(user_id: i64) -> String {
    session_token::issue(
        &auth_config(),
        user_id,
        user_id + 1000,
        Some("ada"),
        Some("Ada"),
        None,
        SystemTime::now(),
    )
    .expect("fixture config has a session secret")
    .token
}
