use rusqlite::Connection;
use serde_json::{json, Value};

use super::error::HandlerErr;
use super::types::AppState;

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            HandlerErr::bad_params(format!("missing {}", key)).with_details(json!({ "key": key }))
        })
}

pub fn get_optional_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

pub fn get_optional_usize(params: &Value, key: &str) -> Result<Option<usize>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a positive integer", key))),
    }
}

pub fn get_object<'a>(params: &'a Value, key: &str) -> Result<&'a Value, HandlerErr> {
    match params.get(key) {
        Some(v) if v.is_object() => Ok(v),
        _ => Err(HandlerErr::bad_params(format!("{} must be an object", key))),
    }
}
