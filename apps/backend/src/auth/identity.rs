//! Identity enforcement over caller-supplied request fields.
//!
//! A request authenticated as user A must not assert, via header, body or
//! query, that it is acting as user B. Checks run in a fixed order and stop
//! at the first conflict; absent fields are backfilled with the resolved id
//! for legacy callers that expect them downstream.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};

/// Header legacy clients use to assert a user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Where a conflicting identity assertion was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLocation {
    Header,
    Body,
    Query,
}

impl fmt::Display for FieldLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldLocation::Header => write!(f, "header"),
            FieldLocation::Body => write!(f, "body"),
            FieldLocation::Query => write!(f, "query"),
        }
    }
}

/// A caller-declared user id that conflicts with the authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityMismatch {
    pub location: FieldLocation,
    pub field: &'static str,
}

/// Parse a caller-supplied value as a positive numeric user id.
/// Empty, non-numeric and non-positive values all count as "not asserted".
fn numeric_id_from_str(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<i64>().ok().filter(|id| *id > 0)
}

fn numeric_id_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().filter(|id| *id > 0),
        Value::String(s) => numeric_id_from_str(s),
        _ => None,
    }
}

fn check(
    asserted: Option<i64>,
    user_id: i64,
    location: FieldLocation,
    field: &'static str,
) -> Result<(), IdentityMismatch> {
    match asserted {
        Some(id) if id != user_id => Err(IdentityMismatch { location, field }),
        _ => Ok(()),
    }
}

/// Reject any request field that asserts a user id different from
/// `user_id`, then backfill absent fields with the resolved id.
///
/// Check order is fixed: header, then body `user_id`/`userId`/`followerId`,
/// then query `user_id`/`follower_id`. Backfill only ever adds a value where
/// none was asserted; a conflicting value is never overwritten, it is
/// rejected. `followerId` is only backfilled when the key already exists.
pub fn enforce(
    user_id: i64,
    header_user_id: Option<&str>,
    body: Option<&mut Map<String, Value>>,
    query: &mut HashMap<String, String>,
) -> Result<(), IdentityMismatch> {
    check(
        header_user_id.and_then(numeric_id_from_str),
        user_id,
        FieldLocation::Header,
        USER_ID_HEADER,
    )?;

    if let Some(body) = &body {
        for field in ["user_id", "userId", "followerId"] {
            check(
                body.get(field).and_then(numeric_id_from_value),
                user_id,
                FieldLocation::Body,
                field,
            )?;
        }
    }

    for field in ["user_id", "follower_id"] {
        check(
            query.get(field).and_then(|v| numeric_id_from_str(v)),
            user_id,
            FieldLocation::Query,
            field,
        )?;
    }

    if let Some(body) = body {
        for field in ["user_id", "userId"] {
            if body.get(field).and_then(numeric_id_from_value).is_none() {
                body.insert(field.to_string(), Value::from(user_id));
            }
        }
        // followerId keeps its absence meaningful downstream.
        if body.contains_key("followerId")
            && body.get("followerId").and_then(numeric_id_from_value).is_none()
        {
            body.insert("followerId".to_string(), Value::from(user_id));
        }
    }

    if query.get("user_id").and_then(|v| numeric_id_from_str(v)).is_none() {
        query.insert("user_id".to_string(), user_id.to_string());
    }

    Ok(())
}
