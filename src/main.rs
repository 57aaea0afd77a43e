mod config;
mod db;
mod ipc;
mod records;
mod store;
mod view;

use std::io::{self, BufRead, Write};

use serde_json::json;
use tracing::{error, info, warn};

fn main() {
    let cfg = config::DaemonConfig::from_env();
    cfg.init_tracing();

    let mut state = ipc::AppState::default();
    if let Some(path) = cfg.workspace.clone() {
        if let Err(e) = ipc::select_workspace(&mut state, path) {
            // The client can still pick a workspace over the protocol.
            error!(error = %format!("{e:#}"), "startup workspace failed to open");
        }
    }
    info!(version = env!("CARGO_PKG_VERSION"), "schooldeskd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            // Without a parsed id there is nothing to echo back.
            Err(e) => json!({
                "ok": false,
                "error": { "code": "bad_json", "message": e.to_string() }
            }),
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    info!("schooldeskd exiting");
}
