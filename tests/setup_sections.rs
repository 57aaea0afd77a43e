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

#[test]
fn setup_sections_roundtrip_and_drive_views_and_bulk() {
    let workspace = temp_dir("schooldesk-setup");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let initial = request_ok(&mut stdin, &mut reader, "2", "setup.get", json!({}));
    assert_eq!(initial.pointer("/lists/defaultPageSize").and_then(|v| v.as_u64()), Some(10));
    assert_eq!(initial.pointer("/bulk/confirmDeletes").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(initial.pointer("/export/delimiter").and_then(|v| v.as_str()), Some(","));

    for (i, (section, patch)) in [
        ("lists", json!({ "defaultPageSize": 0 })),
        ("lists", json!({ "defaultSortDirection": "sideways" })),
        ("bulk", json!({ "confirmDeletes": "yes" })),
        ("export", json!({ "delimiter": "#" })),
        ("export", json!({ "encoding": "latin1" })),
        ("colours", json!({})),
    ]
    .into_iter()
    .enumerate()
    {
        let resp = request(
            &mut stdin,
            &mut reader,
            &format!("bad{}", i),
            "setup.update",
            json!({ "section": section, "patch": patch }),
        );
        assert_eq!(error_code(&resp), Some("bad_params"), "{} {}", section, resp);
    }

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "setup.update",
        json!({ "section": "lists", "patch": { "defaultPageSize": 2, "defaultSortDirection": "desc" } }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "setup.update",
        json!({ "section": "bulk", "patch": { "confirmDeletes": false } }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "setup.update",
        json!({ "section": "export", "patch": { "delimiter": "tab", "includeHeader": false } }),
    );
    let after = request_ok(&mut stdin, &mut reader, "6", "setup.get", json!({}));
    assert_eq!(after.pointer("/lists/defaultPageSize").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(after.pointer("/export/delimiter").and_then(|v| v.as_str()), Some("tab"));

    let school = request_ok(&mut stdin, &mut reader, "7", "schools.create", json!({ "name": "Setup School" }));
    let school_id = school.get("schoolId").and_then(|v| v.as_str()).expect("schoolId").to_string();
    for name in ["Ann", "Ben", "Cal"] {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("s-{}", name),
            "users.create",
            json!({
                "schoolId": school_id,
                "record": { "fullName": name, "email": format!("{}@school.test", name.to_lowercase()), "role": "staff" }
            }),
        );
    }

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "view.open",
        json!({ "entity": "users", "schoolId": school_id }),
    );
    let view_id = opened.get("viewId").and_then(|v| v.as_str()).expect("viewId").to_string();
    assert_eq!(opened.get("pageSize").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(opened.get("totalPages").and_then(|v| v.as_u64()), Some(2));

    // A new sort key starts in the configured default direction.
    let sorted = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "view.setSort",
        json!({ "viewId": view_id, "key": "full_name" }),
    );
    assert_eq!(sorted.pointer("/sort/direction").and_then(|v| v.as_str()), Some("desc"));
    assert_eq!(sorted.pointer("/items/0/fullName").and_then(|v| v.as_str()), Some("Cal"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "selection.toggleAll",
        json!({ "viewId": view_id }),
    );
    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "bulk.dispatch",
        json!({ "viewId": view_id, "action": "export" }),
    );
    let location = exported
        .pointer("/report/export/location")
        .and_then(|v| v.as_str())
        .expect("location");
    assert!(location.ends_with(".tsv"));
    let text = std::fs::read_to_string(location).expect("read export");
    // Select-all spans every filtered row, not just the two on this page.
    assert_eq!(text.lines().count(), 3);
    assert!(text.lines().all(|l| l.contains('\t')));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "selection.toggleAll",
        json!({ "viewId": view_id }),
    );
    // confirmDeletes is off, so no confirmed flag is needed.
    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "bulk.dispatch",
        json!({ "viewId": view_id, "action": "delete" }),
    );
    assert_eq!(deleted.get("declined").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(deleted.pointer("/view/totalCount").and_then(|v| v.as_u64()), Some(0));
}
