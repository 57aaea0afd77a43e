use serde_json::{json, Map, Value};

use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::view::bulk::ExportOptions;
use crate::view::paging::MAX_PAGE_SIZE;
use crate::view::sort::SortDirection;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Clone, Copy)]
enum SetupSection {
    Lists,
    Bulk,
    Export,
}

impl SetupSection {
    const ALL: [SetupSection; 3] = [Self::Lists, Self::Bulk, Self::Export];

    fn parse(s: &str) -> Option<Self> {
        match s {
            "lists" => Some(Self::Lists),
            "bulk" => Some(Self::Bulk),
            "export" => Some(Self::Export),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Lists => "lists",
            Self::Bulk => "bulk",
            Self::Export => "export",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Lists => "setup.lists",
            Self::Bulk => "setup.bulk",
            Self::Export => "setup.export",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Lists => json!({
            "defaultPageSize": DEFAULT_PAGE_SIZE,
            "defaultSortDirection": "asc"
        }),
        SetupSection::Bulk => json!({
            "confirmDeletes": true
        }),
        SetupSection::Export => json!({
            "delimiter": ",",
            "includeHeader": true
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v.as_i64().ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_one_of(v: &Value, key: &str, allowed: &[&str]) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim().to_ascii_lowercase();
    if !allowed.contains(&s.as_str()) {
        return Err(format!("{} must be one of: {}", key, allowed.join(", ")));
    }
    Ok(s)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Lists => match k.as_str() {
                "defaultPageSize" => {
                    let n = parse_i64_range(v, k, 1, MAX_PAGE_SIZE as i64)?;
                    obj.insert(k.clone(), json!(n));
                }
                "defaultSortDirection" => {
                    let s = parse_one_of(v, k, &["asc", "desc"])?;
                    obj.insert(k.clone(), json!(s));
                }
                _ => return Err(format!("unknown lists field: {}", k)),
            },
            SetupSection::Bulk => match k.as_str() {
                "confirmDeletes" => {
                    obj.insert(k.clone(), json!(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown bulk field: {}", k)),
            },
            SetupSection::Export => match k.as_str() {
                "delimiter" => {
                    let s = parse_one_of(v, k, &[",", ";", "|", "tab"])?;
                    obj.insert(k.clone(), json!(s));
                }
                "includeHeader" => {
                    obj.insert(k.clone(), json!(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown export field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Apply field by field so one bad stored value keeps its default.
            for (k, v) in saved_obj {
                let mut single = Map::new();
                single.insert(k.clone(), v.clone());
                let _ = merge_section_patch(section, &mut current, &single);
            }
        }
    }
    Ok(current)
}

/// Page size and sort direction new views start with.
pub fn list_defaults(conn: &rusqlite::Connection) -> (usize, SortDirection) {
    let lists = load_section(conn, SetupSection::Lists)
        .unwrap_or_else(|_| default_section(SetupSection::Lists));
    let page_size = lists
        .get("defaultPageSize")
        .and_then(|v| v.as_u64())
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_PAGE_SIZE);
    let direction = lists
        .get("defaultSortDirection")
        .and_then(|v| v.as_str())
        .and_then(SortDirection::parse)
        .unwrap_or(SortDirection::Asc);
    (page_size, direction)
}

pub fn confirm_deletes(conn: &rusqlite::Connection) -> bool {
    load_section(conn, SetupSection::Bulk)
        .ok()
        .and_then(|v| v.get("confirmDeletes").and_then(|b| b.as_bool()))
        .unwrap_or(true)
}

pub fn export_options(conn: &rusqlite::Connection) -> ExportOptions {
    let Ok(section) = load_section(conn, SetupSection::Export) else {
        return ExportOptions::default();
    };
    let delimiter = match section.get("delimiter").and_then(|v| v.as_str()) {
        Some(";") => b';',
        Some("|") => b'|',
        Some("tab") => b'\t',
        _ => b',',
    };
    let include_header = section
        .get("includeHeader")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    ExportOptions {
        delimiter,
        include_header,
    }
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let mut out = Map::new();
    for section in SetupSection::ALL {
        match load_section(conn, section) {
            Ok(v) => {
                out.insert(section.name().to_string(), v);
            }
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }
    ok(&req.id, Value::Object(out))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(
        &req.id,
        json!({ "ok": true, "section": section.name(), "values": current }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
