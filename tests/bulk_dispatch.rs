use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_schooldeskd");
    let mut child = Command::new(exe)
        .env_remove("SCHOOLDESKD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn schooldeskd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> Option<&str> {
    value.pointer("/error/code").and_then(|v| v.as_str())
}

fn select_workspace(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    prefix: &str,
) -> (PathBuf, String) {
    let workspace = temp_dir(prefix);
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let school = request_ok(
        stdin,
        reader,
        "school",
        "schools.create",
        json!({ "name": "Bulk School" }),
    );
    let school_id = school
        .get("schoolId")
        .and_then(|v| v.as_str())
        .expect("schoolId")
        .to_string();
    (workspace, school_id)
}

fn create_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    school_id: &str,
    name: &str,
) -> String {
    let s = request_ok(
        stdin,
        reader,
        &format!("create-{}", name),
        "students.create",
        json!({ "schoolId": school_id, "record": { "fullName": name } }),
    );
    s.get("id").and_then(|v| v.as_str()).expect("id").to_string()
}

fn open_view(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    entity: &str,
    school_id: &str,
) -> String {
    let opened = request_ok(
        stdin,
        reader,
        &format!("open-{}", entity),
        "view.open",
        json!({ "entity": entity, "schoolId": school_id }),
    );
    opened.get("viewId").and_then(|v| v.as_str()).expect("viewId").to_string()
}

fn selection_len(snapshot: &serde_json::Value) -> usize {
    snapshot
        .get("selection")
        .and_then(|v| v.as_array())
        .map(|a| a.len())
        .expect("selection")
}

#[test]
fn delete_needs_confirmation_and_refetches_after() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (_ws, school_id) = select_workspace(&mut stdin, &mut reader, "schooldesk-bulk-delete");
    let ids: Vec<String> = ["Ann", "Ben", "Cal"]
        .iter()
        .map(|n| create_student(&mut stdin, &mut reader, &school_id, n))
        .collect();
    let view_id = open_view(&mut stdin, &mut reader, "students", &school_id);
    for id in &ids[..2] {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("t-{}", id),
            "selection.toggle",
            json!({ "viewId": view_id, "id": id }),
        );
    }

    let declined = request_ok(
        &mut stdin,
        &mut reader,
        "d1",
        "bulk.dispatch",
        json!({ "viewId": view_id, "action": "delete" }),
    );
    assert_eq!(declined.get("declined").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(selection_len(&declined["view"]), 2);
    assert_eq!(declined.pointer("/view/totalCount").and_then(|v| v.as_u64()), Some(3));

    let done = request_ok(
        &mut stdin,
        &mut reader,
        "d2",
        "bulk.dispatch",
        json!({ "viewId": view_id, "action": "delete", "confirmed": true }),
    );
    assert_eq!(done.get("declined").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(done.get("summary").and_then(|v| v.as_str()), Some("2 succeeded, 0 failed"));
    assert_eq!(done.pointer("/report/refresh").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(selection_len(&done["view"]), 0);
    assert_eq!(done.pointer("/view/totalCount").and_then(|v| v.as_u64()), Some(1));
}

#[test]
fn transfer_reports_per_id_failures_when_class_fills_up() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (_ws, school_id) = select_workspace(&mut stdin, &mut reader, "schooldesk-bulk-transfer");
    let class = request_ok(
        &mut stdin,
        &mut reader,
        "class",
        "classes.create",
        json!({ "schoolId": school_id, "record": { "name": "Small Room", "capacity": 2 } }),
    );
    let class_id = class.get("id").and_then(|v| v.as_str()).expect("class id").to_string();
    for n in ["Ann", "Ben", "Cal"] {
        create_student(&mut stdin, &mut reader, &school_id, n);
    }
    let view_id = open_view(&mut stdin, &mut reader, "students", &school_id);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "all",
        "selection.toggleAll",
        json!({ "viewId": view_id }),
    );

    let missing_class = request(
        &mut stdin,
        &mut reader,
        "t0",
        "bulk.dispatch",
        json!({ "viewId": view_id, "action": "transfer" }),
    );
    assert_eq!(error_code(&missing_class), Some("bad_params"));

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "t1",
        "bulk.dispatch",
        json!({ "viewId": view_id, "action": "transfer", "classId": class_id }),
    );
    assert_eq!(result.get("summary").and_then(|v| v.as_str()), Some("2 succeeded, 1 failed"));
    let reason = result
        .pointer("/report/failed/0/reason")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    assert!(reason.contains("full"), "{}", reason);
    assert_eq!(selection_len(&result["view"]), 0);

    let enrolled = result
        .pointer("/view/items")
        .and_then(|v| v.as_array())
        .expect("items")
        .iter()
        .filter(|s| s.pointer("/class/name").and_then(|v| v.as_str()) == Some("Small Room"))
        .count();
    assert_eq!(enrolled, 2);

    let classes_view = open_view(&mut stdin, &mut reader, "classes", &school_id);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "sel-class",
        "selection.toggle",
        json!({ "viewId": classes_view, "id": class_id }),
    );
    let unsupported = request(
        &mut stdin,
        &mut reader,
        "t2",
        "bulk.dispatch",
        json!({ "viewId": classes_view, "action": "transfer", "classId": class_id }),
    );
    assert_eq!(error_code(&unsupported), Some("unsupported_action"));
}

#[test]
fn export_writes_csv_and_clears_selection_without_mutating() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (workspace, school_id) = select_workspace(&mut stdin, &mut reader, "schooldesk-bulk-export");
    let ann = create_student(&mut stdin, &mut reader, &school_id, "Ann, Jr");
    create_student(&mut stdin, &mut reader, &school_id, "Ben");
    let view_id = open_view(&mut stdin, &mut reader, "students", &school_id);

    let empty = request(
        &mut stdin,
        &mut reader,
        "e0",
        "bulk.dispatch",
        json!({ "viewId": view_id, "action": "export" }),
    );
    assert_eq!(error_code(&empty), Some("bad_params"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "sel",
        "selection.toggle",
        json!({ "viewId": view_id, "id": ann }),
    );
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "e1",
        "bulk.dispatch",
        json!({ "viewId": view_id, "action": "export" }),
    );
    assert_eq!(result.pointer("/report/refresh").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(result.pointer("/report/export/rows").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(selection_len(&result["view"]), 0);

    let location = result
        .pointer("/report/export/location")
        .and_then(|v| v.as_str())
        .expect("location");
    let path = PathBuf::from(location);
    assert!(path.starts_with(workspace.join("exports")));
    let text = std::fs::read_to_string(&path).expect("read export");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Student ID,Student No,Full Name"));
    assert!(lines[1].contains("\"Ann, Jr\""));
}

#[test]
fn payments_sort_mixed_amounts_numerically_and_bulk_mark_paid() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (_ws, school_id) = select_workspace(&mut stdin, &mut reader, "schooldesk-bulk-payments");
    let student = create_student(&mut stdin, &mut reader, &school_id, "Ann");
    let amounts = [json!(300), json!("150"), json!(150.0), json!(500)];
    for (i, amount) in amounts.iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("pay{}", i),
            "payments.create",
            json!({ "schoolId": school_id, "record": { "studentId": student, "amount": amount } }),
        );
    }
    let view_id = open_view(&mut stdin, &mut reader, "payments", &school_id);
    let sorted = request_ok(
        &mut stdin,
        &mut reader,
        "sort",
        "view.setSort",
        json!({ "viewId": view_id, "key": "amount", "direction": "asc" }),
    );
    let got: Vec<f64> = sorted
        .get("items")
        .and_then(|v| v.as_array())
        .expect("items")
        .iter()
        .map(|p| p.get("amount").and_then(|v| v.as_f64()).expect("amount"))
        .collect();
    assert_eq!(got, vec![150.0, 150.0, 300.0, 500.0]);

    let ranged = request_ok(
        &mut stdin,
        &mut reader,
        "min",
        "view.setFilter",
        json!({ "viewId": view_id, "key": "minAmount", "value": 200 }),
    );
    assert_eq!(ranged.get("filteredCount").and_then(|v| v.as_u64()), Some(2));
    let ignored = request_ok(
        &mut stdin,
        &mut reader,
        "max",
        "view.setFilter",
        json!({ "viewId": view_id, "key": "maxAmount", "value": "lots" }),
    );
    assert_eq!(ignored.get("filteredCount").and_then(|v| v.as_u64()), Some(2));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "all",
        "selection.toggleAll",
        json!({ "viewId": view_id }),
    );
    let paid = request_ok(
        &mut stdin,
        &mut reader,
        "paid",
        "bulk.dispatch",
        json!({ "viewId": view_id, "action": "setStatus", "status": "paid" }),
    );
    assert_eq!(paid.get("summary").and_then(|v| v.as_str()), Some("2 succeeded, 0 failed"));
    let statuses: Vec<&str> = paid
        .pointer("/view/items")
        .and_then(|v| v.as_array())
        .expect("items")
        .iter()
        .map(|p| p.get("status").and_then(|v| v.as_str()).unwrap_or(""))
        .collect();
    assert_eq!(statuses, vec!["paid", "paid"]);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "reset",
        "view.resetFilters",
        json!({ "viewId": view_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "all2",
        "selection.toggleAll",
        json!({ "viewId": view_id }),
    );
    let bad = request_ok(
        &mut stdin,
        &mut reader,
        "bad",
        "bulk.dispatch",
        json!({ "viewId": view_id, "action": "setStatus", "status": "graduated" }),
    );
    assert_eq!(bad.get("summary").and_then(|v| v.as_str()), Some("0 succeeded, 4 failed"));
}

#[test]
fn selection_is_confined_to_the_view_school() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (_ws, school_a) = select_workspace(&mut stdin, &mut reader, "schooldesk-bulk-tenant");
    let other = request_ok(
        &mut stdin,
        &mut reader,
        "school-b",
        "schools.create",
        json!({ "name": "Other School" }),
    );
    let school_b = other
        .get("schoolId")
        .and_then(|v| v.as_str())
        .expect("schoolId")
        .to_string();
    let outsider = create_student(&mut stdin, &mut reader, &school_b, "Outsider");
    let local = create_student(&mut stdin, &mut reader, &school_a, "Local");
    let view_id = open_view(&mut stdin, &mut reader, "students", &school_a);

    let foreign = request(
        &mut stdin,
        &mut reader,
        "t-foreign",
        "selection.toggle",
        json!({ "viewId": view_id, "id": outsider }),
    );
    assert_eq!(error_code(&foreign), Some("not_found"));
    assert_eq!(
        foreign.pointer("/error/details/id").and_then(|v| v.as_str()),
        Some(outsider.as_str())
    );
    assert_eq!(
        foreign.pointer("/error/details/viewId").and_then(|v| v.as_str()),
        Some(view_id.as_str())
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "t-local",
        "selection.toggle",
        json!({ "viewId": view_id, "id": local }),
    );
    let done = request_ok(
        &mut stdin,
        &mut reader,
        "d",
        "bulk.dispatch",
        json!({ "viewId": view_id, "action": "delete", "confirmed": true }),
    );
    assert_eq!(done.get("summary").and_then(|v| v.as_str()), Some("1 succeeded, 0 failed"));

    let b_list = request_ok(
        &mut stdin,
        &mut reader,
        "list-b",
        "students.list",
        json!({ "schoolId": school_b }),
    );
    assert_eq!(b_list.get("count").and_then(|v| v.as_u64()), Some(1));
}

#[test]
fn selected_rows_removed_elsewhere_fail_instead_of_exporting() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (_ws, school_id) = select_workspace(&mut stdin, &mut reader, "schooldesk-bulk-stale");
    let gone = create_student(&mut stdin, &mut reader, &school_id, "Gone");
    let kept = create_student(&mut stdin, &mut reader, &school_id, "Kept");
    let view_id = open_view(&mut stdin, &mut reader, "students", &school_id);
    for id in [&gone, &kept] {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("t-{}", id),
            "selection.toggle",
            json!({ "viewId": view_id, "id": id }),
        );
    }
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "del",
        "students.delete",
        json!({ "id": gone }),
    );
    let refreshed = request_ok(
        &mut stdin,
        &mut reader,
        "refresh",
        "view.refresh",
        json!({ "viewId": view_id }),
    );
    assert_eq!(refreshed.get("totalCount").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(selection_len(&refreshed), 2);

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "export",
        "bulk.dispatch",
        json!({ "viewId": view_id, "action": "export" }),
    );
    assert_eq!(result.get("summary").and_then(|v| v.as_str()), Some("1 succeeded, 1 failed"));
    assert_eq!(result.pointer("/report/export/rows").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(
        result.pointer("/report/failed/0/id").and_then(|v| v.as_str()),
        Some(gone.as_str())
    );
    assert_eq!(
        result.pointer("/report/failed/0/reason").and_then(|v| v.as_str()),
        Some("record no longer in view")
    );
}
