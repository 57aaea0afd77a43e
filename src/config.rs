//! Process-level settings read from the environment at startup.
//!
//! `SCHOOLDESKD_LOG` takes an `EnvFilter` directive (default `info`).
//! `SCHOOLDESKD_WORKSPACE` selects a workspace before the first request.
//! Everything else lives in the workspace `settings` table.

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "SCHOOLDESKD_LOG";
pub const WORKSPACE_ENV: &str = "SCHOOLDESKD_WORKSPACE";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaemonConfig {
    pub log_filter: Option<String>,
    pub workspace: Option<PathBuf>,
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self {
            log_filter: env_value(LOG_ENV),
            workspace: env_value(WORKSPACE_ENV).map(PathBuf::from),
        }
    }

    fn filter(&self) -> EnvFilter {
        let directive = self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER);
        EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    }

    /// Logs go to stderr; stdout carries the protocol.
    pub fn init_tracing(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(self.filter())
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}
