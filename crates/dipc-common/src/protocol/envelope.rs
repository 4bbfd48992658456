//! Message envelope.
//!
//! The body of every Json frame is one envelope object:
//!
//! - Request/Event: `{"method": string, "params": object}`
//! - Response: `{"ok": true, "data": any}` or
//!   `{"ok": false, "error": {"code": int, "message": string}}`
//!
//! Builders produce `serde_json::Value`s ready to serialize; parsers work on
//! the raw body bytes and apply the protocol's defaulting rules (absent or
//! null `params` is the empty object, absent `data` in an ok response is the
//! empty object, malformed `error` objects fall back to internal_error).
//! Parsing goes through `Value` rather than typed structs so that invalid
//! JSON (ParseError) and a wrong shape (InvalidRequest) stay distinct
//! outcomes. Unknown extra fields are ignored.

use serde_json::{json, Value};

use crate::protocol::error::{RpcError, RpcOutcome, INTERNAL_ERROR};

/// A parsed incoming request or event body.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody {
    pub method: String,
    pub params: Value,
}

/// Builds the body object for a Request or Event frame.
///
/// A null `params` is sent as the empty object.
pub fn make_request_body(method: &str, params: &Value) -> Value {
    let params = if params.is_null() {
        json!({})
    } else {
        params.clone()
    };
    json!({ "method": method, "params": params })
}

/// Builds the body object for a Response frame from a handler outcome.
pub fn make_response_body(outcome: &RpcOutcome) -> Value {
    match outcome {
        Ok(data) => json!({ "ok": true, "data": data }),
        Err(error) => json!({
            "ok": false,
            "error": { "code": error.code, "message": error.message },
        }),
    }
}

/// Parses an incoming Request/Event body.
///
/// Invalid JSON maps to `PARSE_ERROR`; a missing or non-string `method`
/// maps to `INVALID_REQUEST`. A missing or null `params` becomes `{}`.
pub fn parse_request_body(body: &[u8]) -> std::result::Result<RequestBody, RpcError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|_| RpcError::parse_error("parse_error"))?;

    let method = match value.get("method").and_then(Value::as_str) {
        Some(method) => method.to_string(),
        None => return Err(RpcError::invalid_request("invalid_request")),
    };

    let params = match value.get("params") {
        None | Some(Value::Null) => json!({}),
        Some(params) => params.clone(),
    };

    Ok(RequestBody { method, params })
}

/// Parses an incoming Response body into the outcome it carries.
///
/// Invalid JSON maps to `PARSE_ERROR`; a body without a boolean `ok` maps
/// to `INVALID_REQUEST`. For `ok: false` bodies, missing fields inside
/// `error` fall back to `INTERNAL_ERROR` / "error".
pub fn parse_response_body(body: &[u8]) -> RpcOutcome {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => return Err(RpcError::parse_error("response_parse_error")),
    };

    let ok = match value.get("ok").and_then(Value::as_bool) {
        Some(ok) => ok,
        None => return Err(RpcError::invalid_request("invalid_response")),
    };

    if ok {
        return Ok(value.get("data").cloned().unwrap_or_else(|| json!({})));
    }

    match value.get("error") {
        Some(Value::Object(error)) => {
            let code = error
                .get("code")
                .and_then(Value::as_i64)
                .map(|code| code as i32)
                .unwrap_or(INTERNAL_ERROR);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("error")
                .to_string();
            Err(RpcError::new(code, message))
        }
        _ => Err(RpcError::new(INTERNAL_ERROR, "error")),
    }
}
