//! `<entity>.list|create|update|delete` for every managed entity.

use serde_json::json;
use tracing::debug;

use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::{get_object, get_required_str, require_db};
use crate::ipc::types::{AppState, Request};
use crate::records::{EntityKind, Record};
use crate::store::{Mutation, RecordStore, SqliteStore};

use super::schools::ensure_school;

fn records_list(state: &AppState, kind: EntityKind, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let school_id = get_required_str(&req.params, "schoolId")?;
    ensure_school(conn, &school_id)?;
    let records = SqliteStore::new(conn)
        .fetch_records(kind, &school_id)
        .map_err(|e| HandlerErr::new("fetch_failed", e.to_string()))?;
    Ok(json!({ "items": records, "count": records.len() }))
}

fn records_create(state: &AppState, kind: EntityKind, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let school_id = get_required_str(&req.params, "schoolId")?;
    let payload = get_object(&req.params, "record")?;
    let record = SqliteStore::new(conn).create_record(kind, &school_id, payload)?;
    Ok(json!({ "id": record.id(), "record": record }))
}

fn records_update(state: &AppState, kind: EntityKind, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let id = get_required_str(&req.params, "id")?;
    let patch = get_object(&req.params, "patch")?;
    let store = SqliteStore::new(conn);
    store.mutate_record(kind, &id, Mutation::Update(patch.clone()))?;
    let record = store.load(kind, &id)?;
    Ok(json!({ "record": record }))
}

fn records_delete(state: &AppState, kind: EntityKind, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let id = get_required_str(&req.params, "id")?;
    SqliteStore::new(conn).mutate_record(kind, &id, Mutation::Delete)?;
    Ok(json!({ "deleted": id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let (entity, op) = req.method.split_once('.')?;
    let kind = EntityKind::parse(entity)?;
    let result = match op {
        "list" => records_list(state, kind, req),
        "create" => records_create(state, kind, req),
        "update" => records_update(state, kind, req),
        "delete" => records_delete(state, kind, req),
        _ => return None,
    };
    if let Err(e) = &result {
        debug!(entity = kind.as_str(), op, code = e.code, "record request failed");
    }
    Some(respond(&req.id, result))
}
