//! Open list views and the actions taken on them: `view.*`, `selection.*`
//! and `bulk.dispatch`.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::{get_optional_str, get_optional_usize, get_required_str, require_db};
use crate::ipc::types::{AppState, Request};
use crate::records::EntityKind;
use crate::store::SqliteStore;
use crate::view::bulk::{BulkAction, BulkActionKind, BulkOutcome, Collaborators, DownloadSink};
use crate::view::list::ListError;
use crate::view::paging::MAX_PAGE_SIZE;
use crate::view::sort::SortDirection;
use crate::view::ViewSession;

use super::schools::ensure_school;
use super::setup::{confirm_deletes, export_options, list_defaults, DEFAULT_PAGE_SIZE};

/// Writes export files under `<workspace>/exports/`.
struct ExportDir {
    dir: PathBuf,
}

impl DownloadSink for ExportDir {
    fn deliver(&mut self, file_name: &str, contents: &str) -> anyhow::Result<String> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let out = self.dir.join(file_name);
        std::fs::write(&out, contents)
            .with_context(|| format!("failed to write {}", out.display()))?;
        Ok(out.to_string_lossy().to_string())
    }
}

fn snapshot_json(view_id: &str, view: &mut ViewSession) -> Result<Value, HandlerErr> {
    let mut v = serde_json::to_value(view.snapshot())
        .map_err(|e| HandlerErr::new("internal_error", e.to_string()))?;
    v["viewId"] = json!(view_id);
    Ok(v)
}

fn find_view<'a>(
    views: &'a mut HashMap<String, ViewSession>,
    params: &Value,
) -> Result<(String, &'a mut ViewSession), HandlerErr> {
    let view_id = get_required_str(params, "viewId")?;
    match views.get_mut(&view_id) {
        Some(view) => Ok((view_id, view)),
        None => Err(HandlerErr::new("not_found", "view not found")
            .with_details(json!({ "viewId": view_id }))),
    }
}

fn fetch_failed(e: impl std::fmt::Display) -> HandlerErr {
    HandlerErr::new("fetch_failed", e.to_string())
}

fn view_open(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let entity = get_required_str(&req.params, "entity")?;
    let Some(kind) = EntityKind::parse(&entity) else {
        return Err(HandlerErr::bad_params(format!("unknown entity: {}", entity)));
    };
    let school_id = get_required_str(&req.params, "schoolId")?;
    ensure_school(conn, &school_id)?;
    let page_size = match get_optional_usize(&req.params, "pageSize")? {
        Some(n) => check_page_size(n)?,
        None => list_defaults(conn).0,
    };

    let store = SqliteStore::new(conn);
    let view = ViewSession::open(&store, kind, &school_id, page_size).map_err(fetch_failed)?;
    let view_id = Uuid::new_v4().to_string();
    info!(view = %view_id, entity = kind.as_str(), school = %school_id, "view opened");
    let view = state.views.entry(view_id.clone()).or_insert(view);
    snapshot_json(&view_id, view)
}

fn view_get(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let (view_id, view) = find_view(&mut state.views, &req.params)?;
    snapshot_json(&view_id, view)
}

fn view_refresh(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let AppState { db, views, .. } = state;
    let conn = db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?;
    let (view_id, view) = find_view(views, &req.params)?;
    view.refresh(&SqliteStore::new(conn)).map_err(fetch_failed)?;
    snapshot_json(&view_id, view)
}

fn view_close(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let view_id = get_required_str(&req.params, "viewId")?;
    if state.views.remove(&view_id).is_none() {
        return Err(HandlerErr::new("not_found", "view not found")
            .with_details(json!({ "viewId": view_id })));
    }
    debug!(view = %view_id, "view closed");
    Ok(json!({ "closed": view_id }))
}

/// Strings pass through; numbers and booleans are stringified; null clears.
fn filter_value(params: &Value) -> Result<String, HandlerErr> {
    match params.get("value") {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(v.to_string()),
        Some(_) => Err(HandlerErr::bad_params("value must be a string or number")),
    }
}

fn view_set_filter(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let (view_id, view) = find_view(&mut state.views, &req.params)?;
    let key = get_required_str(&req.params, "key")?;
    let value = filter_value(&req.params)?;
    let kind = view.kind();
    view.list_mut().set_filter(&key, &value).map_err(|e| match e {
        ListError::UnknownFilter(_) => HandlerErr::bad_params(e.to_string()).with_details(json!({
            "key": key,
            "allowed": kind.filter_defs().iter().map(|d| d.key).collect::<Vec<_>>(),
        })),
    })?;
    snapshot_json(&view_id, view)
}

fn view_reset_filters(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let (view_id, view) = find_view(&mut state.views, &req.params)?;
    view.list_mut().reset_filters();
    snapshot_json(&view_id, view)
}

fn view_set_sort(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let AppState { db, views, .. } = state;
    let default_direction = db
        .as_ref()
        .map(|conn| list_defaults(conn).1)
        .unwrap_or(SortDirection::Asc);
    let (view_id, view) = find_view(views, &req.params)?;
    let direction = match get_optional_str(&req.params, "direction") {
        None => None,
        Some(raw) => Some(SortDirection::parse(raw).ok_or_else(|| {
            HandlerErr::bad_params("direction must be asc or desc")
        })?),
    };
    match get_optional_str(&req.params, "key").map(str::trim) {
        None | Some("") => view.list_mut().clear_sort(),
        Some(key) => view.list_mut().set_sort(key, direction, default_direction),
    }
    snapshot_json(&view_id, view)
}

fn check_page_size(n: usize) -> Result<usize, HandlerErr> {
    if !(1..=MAX_PAGE_SIZE).contains(&n) {
        return Err(HandlerErr::bad_params(format!(
            "pageSize must be in 1..={}",
            MAX_PAGE_SIZE
        )));
    }
    Ok(n)
}

fn view_set_page(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let (view_id, view) = find_view(&mut state.views, &req.params)?;
    let Some(page) = get_optional_usize(&req.params, "page")? else {
        return Err(HandlerErr::bad_params("missing page"));
    };
    view.list_mut().set_page(page);
    snapshot_json(&view_id, view)
}

fn view_set_page_size(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let (view_id, view) = find_view(&mut state.views, &req.params)?;
    let page_size = get_optional_usize(&req.params, "pageSize")?.unwrap_or(DEFAULT_PAGE_SIZE);
    view.list_mut().set_page_size(check_page_size(page_size)?);
    snapshot_json(&view_id, view)
}

fn selection_toggle(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let (view_id, view) = find_view(&mut state.views, &req.params)?;
    let id = get_required_str(&req.params, "id")?;
    // Deselecting a record that vanished on refresh is still allowed.
    if !view.list().selection().contains(&id) && !view.list().has_record(&id) {
        return Err(HandlerErr::new("not_found", "record not in view")
            .with_details(json!({ "viewId": view_id, "id": id })));
    }
    let selected = view.list_mut().toggle(&id);
    let mut snapshot = snapshot_json(&view_id, view)?;
    snapshot["selected"] = json!(selected);
    Ok(snapshot)
}

fn selection_toggle_all(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let (view_id, view) = find_view(&mut state.views, &req.params)?;
    view.list_mut().toggle_all();
    snapshot_json(&view_id, view)
}

fn selection_clear(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let (view_id, view) = find_view(&mut state.views, &req.params)?;
    view.list_mut().clear_selection();
    snapshot_json(&view_id, view)
}

fn parse_action(params: &Value) -> Result<BulkAction, HandlerErr> {
    let raw = get_required_str(params, "action")?;
    let Some(kind) = BulkActionKind::parse(&raw) else {
        return Err(HandlerErr::bad_params(format!("unknown action: {}", raw))
            .with_details(json!({ "allowed": ["delete", "export", "setStatus", "transfer"] })));
    };
    Ok(match kind {
        BulkActionKind::Delete => BulkAction::Delete,
        BulkActionKind::Export => BulkAction::Export,
        BulkActionKind::SetStatus => BulkAction::SetStatus(get_required_str(params, "status")?),
        BulkActionKind::Transfer => BulkAction::Transfer {
            class_id: get_required_str(params, "classId")?,
        },
    })
}

fn bulk_dispatch(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let AppState {
        workspace,
        db,
        views,
    } = state;
    let (Some(conn), Some(workspace)) = (db.as_ref(), workspace.as_ref()) else {
        return Err(HandlerErr::new("no_workspace", "select a workspace first"));
    };
    let (view_id, view) = find_view(views, &req.params)?;
    let action = parse_action(&req.params)?;
    let confirmed = req
        .params
        .get("confirmed")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let store = SqliteStore::new(conn);
    let mut confirm = |action: &BulkAction, count: usize| {
        debug!(action = action.kind().as_str(), count, confirmed, "confirmation requested");
        confirmed
    };
    let mut sink = ExportDir {
        dir: workspace.join("exports"),
    };
    let mut ctx = Collaborators {
        store: &store,
        confirm: &mut confirm,
        downloads: &mut sink,
        export: export_options(conn),
        require_confirmation: confirm_deletes(conn),
    };

    match view.dispatch(&action, &mut ctx)? {
        BulkOutcome::Completed(report) => Ok(json!({
            "declined": false,
            "summary": report.summary(),
            "report": report,
            "view": snapshot_json(&view_id, view)?,
        })),
        BulkOutcome::Declined => Ok(json!({
            "declined": true,
            "pendingCount": view.list().selection().len(),
            "view": snapshot_json(&view_id, view)?,
        })),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "view.open" => view_open(state, req),
        "view.get" => view_get(state, req),
        "view.refresh" => view_refresh(state, req),
        "view.close" => view_close(state, req),
        "view.setFilter" => view_set_filter(state, req),
        "view.resetFilters" => view_reset_filters(state, req),
        "view.setSort" => view_set_sort(state, req),
        "view.setPage" => view_set_page(state, req),
        "view.setPageSize" => view_set_page_size(state, req),
        "selection.toggle" => selection_toggle(state, req),
        "selection.toggleAll" => selection_toggle_all(state, req),
        "selection.clear" => selection_clear(state, req),
        "bulk.dispatch" => bulk_dispatch(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
