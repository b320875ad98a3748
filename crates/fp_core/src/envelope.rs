//! Response envelope shared by the HTTP surface and its client.
//!
//! Success payloads are JSON objects or arrays. A bare `-1`, `0`, `false` or
//! `null` body means the actor's session is gone. An object carrying `error`
//! is a logical failure; when it also carries `conflict` it is a rejected save.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::ListId;
use crate::{Error, Result};

/// Body sent when the request carries no valid session.
pub const LOGGED_OUT: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictInfo {
    pub list_id: ListId,
    pub known: u64,
    pub stored: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictInfo>,
}

impl ErrorBody {
    pub fn from_error(err: &Error) -> Self {
        let conflict = match err {
            Error::VersionConflict { list_id, known, stored } => Some(ConflictInfo {
                list_id: *list_id,
                known: *known,
                stored: *stored,
            }),
            _ => None,
        };
        Self {
            error: err.to_string(),
            conflict,
        }
    }
}

fn is_logged_out(body: &Value) -> bool {
    match body {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(n) => n.as_i64().map_or(false, |n| n == LOGGED_OUT || n == 0),
        Value::String(s) => s.is_empty() || s == "-1" || s == "0",
        _ => false,
    }
}

/// Classify a decoded response body, returning the payload on success.
pub fn interpret(body: Value) -> Result<Value> {
    if is_logged_out(&body) {
        return Err(Error::SessionExpired);
    }
    if body.get("error").is_some() {
        let parsed: ErrorBody = serde_json::from_value(body)?;
        return Err(match parsed.conflict {
            Some(c) => Error::VersionConflict {
                list_id: c.list_id,
                known: c.known,
                stored: c.stored,
            },
            None => Error::Logical(parsed.error),
        });
    }
    Ok(body)
}
