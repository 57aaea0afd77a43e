//! Bulk actions over a selection.
//!
//! Per-ID operations are independent: a failure is recorded and the loop moves
//! on. Nothing is retried.

use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::records::{EntityKind, Record};
use crate::store::{Mutation, RecordStore};

const NOT_IN_VIEW: &str = "record no longer in view";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BulkActionKind {
    Delete,
    Export,
    SetStatus,
    Transfer,
}

impl BulkActionKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "delete" => Some(Self::Delete),
            "export" => Some(Self::Export),
            "setStatus" => Some(Self::SetStatus),
            "transfer" => Some(Self::Transfer),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Export => "export",
            Self::SetStatus => "setStatus",
            Self::Transfer => "transfer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkAction {
    Delete,
    Export,
    SetStatus(String),
    Transfer { class_id: String },
}

impl BulkAction {
    pub fn kind(&self) -> BulkActionKind {
        match self {
            BulkAction::Delete => BulkActionKind::Delete,
            BulkAction::Export => BulkActionKind::Export,
            BulkAction::SetStatus(_) => BulkActionKind::SetStatus,
            BulkAction::Transfer { .. } => BulkActionKind::Transfer,
        }
    }

    pub fn is_destructive(&self) -> bool {
        matches!(self, BulkAction::Delete)
    }

    fn mutation(&self) -> Option<Mutation> {
        match self {
            BulkAction::Delete => Some(Mutation::Delete),
            BulkAction::SetStatus(s) => Some(Mutation::SetStatus(s.clone())),
            BulkAction::Transfer { class_id } => Some(Mutation::Transfer {
                class_id: Some(class_id.clone()),
            }),
            BulkAction::Export => None,
        }
    }
}

/// Synchronous confirmation prompt for destructive actions.
pub trait Confirm {
    fn confirm(&mut self, action: &BulkAction, count: usize) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&BulkAction, usize) -> bool,
{
    fn confirm(&mut self, action: &BulkAction, count: usize) -> bool {
        self(action, count)
    }
}

/// Receives export text and returns where it ended up.
pub trait DownloadSink {
    fn deliver(&mut self, file_name: &str, contents: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportColumn {
    pub header: &'static str,
    pub path: &'static str,
}

impl ExportColumn {
    pub const fn new(header: &'static str, path: &'static str) -> Self {
        Self { header, path }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub delimiter: u8,
    pub include_header: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            include_header: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFailure {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReceipt {
    pub file_name: String,
    pub location: String,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkReport {
    pub action: BulkActionKind,
    pub succeeded: Vec<String>,
    pub failed: Vec<BulkFailure>,
    /// The caller must re-fetch the record set.
    pub refresh: bool,
    pub export: Option<ExportReceipt>,
    pub refresh_error: Option<String>,
}

impl BulkReport {
    fn new(action: BulkActionKind) -> Self {
        Self {
            action,
            succeeded: Vec::new(),
            failed: Vec::new(),
            refresh: false,
            export: None,
            refresh_error: None,
        }
    }

    /// "X succeeded, Y failed" for toast display.
    pub fn summary(&self) -> String {
        format!(
            "{} succeeded, {} failed",
            self.succeeded.len(),
            self.failed.len()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOutcome {
    Completed(BulkReport),
    Declined,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BulkError {
    #[error("a bulk action is already in flight")]
    InFlight,
    #[error("nothing selected")]
    NothingSelected,
    #[error("{action} is not available for {entity}")]
    Unsupported {
        action: &'static str,
        entity: &'static str,
    },
    #[error("export failed: {0}")]
    Export(String),
}

impl BulkError {
    pub fn code(&self) -> &'static str {
        match self {
            BulkError::InFlight => "bulk_in_flight",
            BulkError::NothingSelected => "bad_params",
            BulkError::Unsupported { .. } => "unsupported_action",
            BulkError::Export(_) => "export_failed",
        }
    }
}

pub struct Collaborators<'a> {
    pub store: &'a dyn RecordStore,
    pub confirm: &'a mut dyn Confirm,
    pub downloads: &'a mut dyn DownloadSink,
    pub export: ExportOptions,
    pub require_confirmation: bool,
}

pub fn dispatch<R: Record>(
    kind: EntityKind,
    action: &BulkAction,
    selected: &[String],
    records: &[R],
    ctx: &mut Collaborators<'_>,
) -> Result<BulkOutcome, BulkError> {
    if !kind.bulk_actions().contains(&action.kind()) {
        return Err(BulkError::Unsupported {
            action: action.kind().as_str(),
            entity: kind.as_str(),
        });
    }
    if selected.is_empty() {
        return Err(BulkError::NothingSelected);
    }
    if action.is_destructive()
        && ctx.require_confirmation
        && !ctx.confirm.confirm(action, selected.len())
    {
        info!(entity = kind.as_str(), action = action.kind().as_str(), "bulk action declined");
        return Ok(BulkOutcome::Declined);
    }

    // Only IDs backed by a record in this view reach the store or the file.
    let known: HashSet<&str> = records.iter().map(|r| r.id()).collect();
    let mut report = BulkReport::new(action.kind());
    let mut in_view: Vec<&str> = Vec::with_capacity(selected.len());
    for id in selected {
        if known.contains(id.as_str()) {
            in_view.push(id);
        } else {
            warn!(entity = kind.as_str(), id = %id, "selected id is not in the view");
            report.failed.push(BulkFailure {
                id: id.clone(),
                reason: NOT_IN_VIEW.to_string(),
            });
        }
    }

    let Some(mutation) = action.mutation() else {
        if !in_view.is_empty() {
            let receipt = export_selected(kind, &in_view, records, ctx)?;
            report.succeeded = receipt.ids.clone();
            report.export = Some(receipt.into());
        }
        return Ok(BulkOutcome::Completed(report));
    };

    for id in in_view {
        match ctx.store.mutate_record(kind, id, mutation.clone()) {
            Ok(()) => report.succeeded.push(id.to_string()),
            Err(e) => {
                warn!(entity = kind.as_str(), id = %id, error = %e, "bulk mutation failed");
                report.failed.push(BulkFailure {
                    id: id.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }
    report.refresh = true;
    info!(
        entity = kind.as_str(),
        action = action.kind().as_str(),
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "bulk action settled"
    );
    Ok(BulkOutcome::Completed(report))
}

struct Delivered {
    ids: Vec<String>,
    file_name: String,
    location: String,
}

impl From<Delivered> for ExportReceipt {
    fn from(d: Delivered) -> Self {
        ExportReceipt {
            file_name: d.file_name,
            location: d.location,
            rows: d.ids.len(),
        }
    }
}

/// Selected rows in record-set order.
fn export_selected<R: Record>(
    kind: EntityKind,
    selected: &[&str],
    records: &[R],
    ctx: &mut Collaborators<'_>,
) -> Result<Delivered, BulkError> {
    let wanted: HashSet<&str> = selected.iter().copied().collect();
    let rows: Vec<&R> = records.iter().filter(|r| wanted.contains(r.id())).collect();
    let contents = render_delimited(kind.export_columns(), &rows, ctx.export)?;

    let ext = if ctx.export.delimiter == b'\t' { "tsv" } else { "csv" };
    let file_name = format!(
        "{}-{}.{}",
        kind.as_str(),
        chrono::Utc::now().format("%Y%m%d-%H%M%S"),
        ext
    );
    let location = ctx
        .downloads
        .deliver(&file_name, &contents)
        .map_err(|e| BulkError::Export(e.to_string()))?;
    info!(entity = kind.as_str(), rows = rows.len(), location = %location, "export delivered");
    Ok(Delivered {
        ids: rows.iter().map(|r| r.id().to_string()).collect(),
        file_name,
        location,
    })
}

pub fn render_delimited<R: Record>(
    columns: &[ExportColumn],
    rows: &[&R],
    options: ExportOptions,
) -> Result<String, BulkError> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .from_writer(Vec::new());
    if options.include_header {
        wtr.write_record(columns.iter().map(|c| c.header))
            .map_err(|e| BulkError::Export(e.to_string()))?;
    }
    for row in rows {
        let fields: Vec<String> = columns
            .iter()
            .map(|c| {
                row.field(c.path)
                    .map(|v| v.as_text().into_owned())
                    .unwrap_or_default()
            })
            .collect();
        wtr.write_record(&fields)
            .map_err(|e| BulkError::Export(e.to_string()))?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| BulkError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| BulkError::Export(e.to_string()))
}
