//! Telegram initData fixtures
//!
//! Builds correctly signed initData blobs for integration tests, mirroring
//! what the Telegram client produces: the `hash` field is
//! `hex(HMAC-SHA256(secret_key, check_string))` where
//! `secret_key = HMAC-SHA256("WebAppData", bot_token)` and the check string
//! is the remaining pairs sorted by key and joined as `key=value` lines.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn hmac_sha256(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Sign the given decoded pairs with `bot_token` and return the
/// form-urlencoded blob, `hash` included.
pub fn signed_init_data(bot_token: &str, pairs: &[(&str, &str)]) -> String {
    let mut sorted: Vec<(&str, &str)> = pairs.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let check_string = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n");

    let secret_key = hmac_sha256(b"WebAppData", bot_token.as_bytes());
    let hash = hex::encode(hmac_sha256(&secret_key, check_string.as_bytes()));

    let mut encoded: Vec<(String, String)> = sorted
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    encoded.push(("hash".to_string(), hash));
    serde_urlencoded::to_string(encoded).expect("pairs encode as a query string")
}

/// A signed blob carrying a user claim for `telegram_id`, stamped with the
/// given `auth_date` (unix seconds).
pub fn signed_init_data_for_user(bot_token: &str, telegram_id: i64, auth_date: i64) -> String {
    let user = format!(
        r#"{{"id":{telegram_id},"first_name":"Test","username":"testuser","language_code":"en"}}"#
    );
    let auth_date = auth_date.to_string();
    signed_init_data(
        bot_token,
        &[
            ("auth_date", auth_date.as_str()),
            ("query_id", "AAF9tEURAAAAAH20RRFCpO3idw"),
            ("user", user.as_str()),
        ],
    )
}
