use serde_json::json;

use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::{get_required_str, require_db};
use crate::ipc::types::{AppState, Request};
use crate::records::EntityKind;
use crate::store::{Mutation, RecordStore, SqliteStore};

fn students_enroll(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let class_id = get_required_str(&req.params, "classId")?;
    let store = SqliteStore::new(conn);
    store.mutate_record(
        EntityKind::Students,
        &student_id,
        Mutation::Transfer {
            class_id: Some(class_id),
        },
    )?;
    Ok(json!({ "student": store.load(EntityKind::Students, &student_id)? }))
}

fn students_unenroll(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let store = SqliteStore::new(conn);
    store.mutate_record(
        EntityKind::Students,
        &student_id,
        Mutation::Transfer { class_id: None },
    )?;
    Ok(json!({ "student": store.load(EntityKind::Students, &student_id)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.enroll" => students_enroll(state, req),
        "students.unenroll" => students_unenroll(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
