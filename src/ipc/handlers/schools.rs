use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

use crate::db::now_rfc3339;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::{get_required_str, require_db};
use crate::ipc::types::{AppState, Request};

const MAX_SCHOOL_NAME: usize = 120;

pub fn ensure_school(conn: &Connection, school_id: &str) -> Result<(), HandlerErr> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM schools WHERE id = ?", [school_id], |r| r.get(0))
        .optional()
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    match found {
        Some(_) => Ok(()),
        None => Err(HandlerErr::new("not_found", "school not found")
            .with_details(json!({ "schoolId": school_id }))),
    }
}

fn schools_list(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let mut stmt = conn
        .prepare(
            "SELECT s.id, s.name, s.created_at,
                    (SELECT COUNT(*) FROM students st WHERE st.school_id = s.id),
                    (SELECT COUNT(*) FROM classes c WHERE c.school_id = s.id)
               FROM schools s
              ORDER BY s.name COLLATE NOCASE, s.id",
        )
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let schools = stmt
        .query_map([], |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "name": row.get::<_, String>(1)?,
                "createdAt": row.get::<_, String>(2)?,
                "studentCount": row.get::<_, i64>(3)?,
                "classCount": row.get::<_, i64>(4)?,
            }))
        })
        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    Ok(json!({ "schools": schools }))
}

fn schools_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let name = get_required_str(&req.params, "name")?;
    if name.len() > MAX_SCHOOL_NAME {
        return Err(HandlerErr::bad_params(format!(
            "name length must be <= {}",
            MAX_SCHOOL_NAME
        )));
    }
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO schools(id, name, created_at) VALUES(?, ?, ?)",
        (&id, &name, now_rfc3339()),
    )
    .map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;
    Ok(json!({ "schoolId": id, "name": name }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "schools.list" => schools_list(state, req),
        "schools.create" => schools_create(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
