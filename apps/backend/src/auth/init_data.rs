//! Telegram Mini App initData validation.
//!
//! Validates the signed blob the Telegram client hands to a Mini App and
//! extracts the embedded user claim. The HMAC chain is fixed by the Telegram
//! protocol: `secret_key = HMAC-SHA256("WebAppData", bot_token)` and the
//! supplied `hash` must equal `HMAC-SHA256(secret_key, check_string)` where
//! the check string is the remaining `key=value` pairs sorted
//! lexicographically and joined with newlines.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::auth::claims::{AuthMethod, AuthenticatedUser};
use crate::state::auth_config::AuthConfig;

type HmacSha256 = Hmac<Sha256>;

/// Replay window for `auth_date`: 24 hours. A fixed design constant, not
/// user-configurable.
pub const INIT_DATA_MAX_AGE_SECONDS: i64 = 24 * 60 * 60;

const SECRET_KEY_SEED: &[u8] = b"WebAppData";

/// The embedded `user` claim inside initData.
#[derive(Debug, Deserialize)]
struct InitDataUser {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    language_code: Option<String>,
    #[serde(default)]
    is_premium: Option<bool>,
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(message);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Hex digest the Telegram client is expected to supply for the given
/// check string and bot token.
fn expected_hash(bot_token: &str, check_string: &str) -> Option<String> {
    let secret_key = hmac_sha256(SECRET_KEY_SEED, bot_token.as_bytes())?;
    Some(hex::encode(hmac_sha256(&secret_key, check_string.as_bytes())?))
}

/// Validate an initData blob and return the identity it embeds.
///
/// Fails closed: returns None on a missing bot token, unparsable blob,
/// missing or mismatching hash, stale `auth_date`, or missing/invalid `user`
/// field. Each cause is logged, never surfaced to the caller.
pub fn validate(config: &AuthConfig, init_data: &str, now: SystemTime) -> Option<AuthenticatedUser> {
    let bot_token = config.bot_token()?;
    if init_data.is_empty() {
        return None;
    }

    let pairs: Vec<(String, String)> = match serde_urlencoded::from_str(init_data) {
        Ok(pairs) => pairs,
        Err(e) => {
            debug!("initData rejected: unparsable blob: {e}");
            return None;
        }
    };

    let hash = match pairs.iter().find(|(k, _)| k == "hash") {
        Some((_, v)) => v.clone(),
        None => {
            warn!("initData rejected: missing hash");
            return None;
        }
    };

    // Order is part of the protocol: sort remaining keys lexicographically
    // and join "key=value" lines with '\n'.
    let mut data_check: Vec<&(String, String)> =
        pairs.iter().filter(|(k, _)| k != "hash").collect();
    data_check.sort_by(|a, b| a.0.cmp(&b.0));
    let check_string = data_check
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n");

    let calculated = expected_hash(bot_token, &check_string)?;
    if !bool::from(calculated.as_bytes().ct_eq(hash.as_bytes())) {
        warn!("initData rejected: invalid hash");
        return None;
    }

    let now_secs = now.duration_since(UNIX_EPOCH).ok()?.as_secs() as i64;
    if let Some((_, auth_date)) = pairs.iter().find(|(k, _)| k == "auth_date") {
        if let Ok(auth_date) = auth_date.parse::<i64>() {
            if now_secs - auth_date > INIT_DATA_MAX_AGE_SECONDS {
                warn!("initData rejected: auth_date too old");
                return None;
            }
        }
    }

    let user_json = match pairs.iter().find(|(k, _)| k == "user") {
        Some((_, v)) => v,
        None => {
            warn!("initData rejected: missing user");
            return None;
        }
    };
    let user: InitDataUser = match serde_json::from_str(user_json) {
        Ok(user) => user,
        Err(e) => {
            warn!("initData rejected: unparsable user claim: {e}");
            return None;
        }
    };
    if user.id <= 0 {
        warn!("initData rejected: user claim has no id");
        return None;
    }

    Some(AuthenticatedUser {
        id: user.id,
        telegram_id: Some(user.id),
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
        language_code: user.language_code,
        is_premium: user.is_premium,
        auth_method: AuthMethod::InitData,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    const BOT_TOKEN: &str = "123456:TEST-BOT-TOKEN";

    fn config() -> AuthConfig {
        AuthConfig::new(BOT_TOKEN, None)
    }

    /// Build a correctly signed blob from decoded pairs, mirroring what the
    /// Telegram client produces.
    fn signed_blob(mut pairs: Vec<(&str, String)>) -> String {
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        let check_string = pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("\n");
        let hash = expected_hash(BOT_TOKEN, &check_string).unwrap();

        let mut encoded: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        encoded.push(("hash".to_string(), hash));
        serde_urlencoded::to_string(encoded).unwrap()
    }

    fn sample_blob(auth_date: i64) -> String {
        signed_blob(vec![
            ("auth_date", auth_date.to_string()),
            ("query_id", "AAF9tEURAAAAAH20RRFCpO3idw".to_string()),
            (
                "user",
                r#"{"id":8675309,"first_name":"Ada","last_name":"L","username":"ada","language_code":"en","is_premium":true}"#
                    .to_string(),
            ),
        ])
    }

    fn now_secs() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }

    #[test]
    fn valid_blob_yields_claim() {
        let blob = sample_blob(now_secs());
        let user = validate(&config(), &blob, SystemTime::now()).expect("blob should validate");

        assert_eq!(user.id, 8675309);
        assert_eq!(user.telegram_id, Some(8675309));
        assert_eq!(user.username.as_deref(), Some("ada"));
        assert_eq!(user.first_name.as_deref(), Some("Ada"));
        assert_eq!(user.last_name.as_deref(), Some("L"));
        assert_eq!(user.language_code.as_deref(), Some("en"));
        assert_eq!(user.is_premium, Some(true));
        assert_eq!(user.auth_method, AuthMethod::InitData);
    }

    #[test]
    fn mutated_field_is_rejected() {
        let blob = sample_blob(now_secs());
        // Tamper with the embedded user id after signing.
        let tampered = blob.replace("8675309", "8675310");
        assert_ne!(blob, tampered);
        assert!(validate(&config(), &tampered, SystemTime::now()).is_none());
    }

    #[test]
    fn stale_auth_date_is_rejected_despite_valid_hash() {
        let stale = now_secs() - (INIT_DATA_MAX_AGE_SECONDS + 60);
        let blob = sample_blob(stale);
        assert!(validate(&config(), &blob, SystemTime::now()).is_none());
    }

    #[test]
    fn auth_date_just_inside_window_is_accepted() {
        let now = SystemTime::now();
        let blob = sample_blob(now_secs());
        let later = now + Duration::from_secs((INIT_DATA_MAX_AGE_SECONDS - 60) as u64);
        assert!(validate(&config(), &blob, later).is_some());
    }

    #[test]
    fn missing_hash_is_rejected() {
        let blob = "auth_date=1&user=%7B%22id%22%3A1%7D";
        assert!(validate(&config(), blob, SystemTime::now()).is_none());
    }

    #[test]
    fn missing_user_is_rejected() {
        let blob = signed_blob(vec![("auth_date", now_secs().to_string())]);
        assert!(validate(&config(), &blob, SystemTime::now()).is_none());
    }

    #[test]
    fn unparsable_user_is_rejected() {
        let blob = signed_blob(vec![
            ("auth_date", now_secs().to_string()),
            ("user", "not-json".to_string()),
        ]);
        assert!(validate(&config(), &blob, SystemTime::now()).is_none());
    }

    #[test]
    fn missing_bot_token_fails_closed() {
        let blob = sample_blob(now_secs());
        let unconfigured = AuthConfig::new("", None);
        assert!(validate(&unconfigured, &blob, SystemTime::now()).is_none());
    }

    #[test]
    fn wrong_bot_token_is_rejected() {
        let blob = sample_blob(now_secs());
        let other = AuthConfig::new("999999:OTHER-TOKEN", None);
        assert!(validate(&other, &blob, SystemTime::now()).is_none());
    }
}
