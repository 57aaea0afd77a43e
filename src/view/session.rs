use serde::Serialize;
use tracing::{debug, warn};

use crate::records::{AnyRecord, EntityKind};
use crate::store::{RecordStore, StoreError};
use crate::view::bulk::{self, BulkAction, BulkActionKind, BulkError, BulkOutcome, Collaborators};
use crate::view::filter::FilterSpec;
use crate::view::list::ListSession;
use crate::view::selection::SelectAllState;
use crate::view::sort::SortConfig;

/// One open management page: the fetched record set for a school plus the
/// page's list state.
pub struct ViewSession {
    kind: EntityKind,
    school_id: String,
    list: ListSession<AnyRecord>,
    in_flight: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkState {
    pub available: &'static [BulkActionKind],
    pub in_flight: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSnapshot {
    pub entity: EntityKind,
    pub school_id: String,
    pub items: Vec<AnyRecord>,
    pub page_index: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub total_count: usize,
    pub filtered_count: usize,
    pub filters: FilterSpec,
    pub sort: Option<SortConfig>,
    pub selection: Vec<String>,
    pub select_all: SelectAllState,
    pub bulk: BulkState,
}

impl ViewSession {
    pub fn open(
        store: &dyn RecordStore,
        kind: EntityKind,
        school_id: &str,
        page_size: usize,
    ) -> Result<Self, StoreError> {
        let records = store.fetch_records(kind, school_id)?;
        debug!(entity = kind.as_str(), school = %school_id, count = records.len(), "view opened");
        Ok(Self {
            kind,
            school_id: school_id.to_string(),
            list: ListSession::new(records, kind.filter_defs(), page_size),
            in_flight: false,
        })
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn list(&self) -> &ListSession<AnyRecord> {
        &self.list
    }

    pub fn list_mut(&mut self) -> &mut ListSession<AnyRecord> {
        &mut self.list
    }

    /// Re-fetches the record set. On failure the previous records stay.
    pub fn refresh(&mut self, store: &dyn RecordStore) -> Result<(), StoreError> {
        match store.fetch_records(self.kind, &self.school_id) {
            Ok(records) => {
                self.list.replace_records(records);
                Ok(())
            }
            Err(e) => {
                warn!(entity = self.kind.as_str(), error = %e, "refresh failed, keeping stale records");
                Err(e)
            }
        }
    }

    pub fn begin_dispatch(&mut self) -> Result<(), BulkError> {
        if self.in_flight {
            return Err(BulkError::InFlight);
        }
        self.in_flight = true;
        Ok(())
    }

    pub fn end_dispatch(&mut self) {
        self.in_flight = false;
    }

    /// Runs `action` over the current selection. A completed action clears the
    /// selection, and a mutating one re-fetches the record set.
    pub fn dispatch(
        &mut self,
        action: &BulkAction,
        ctx: &mut Collaborators<'_>,
    ) -> Result<BulkOutcome, BulkError> {
        self.begin_dispatch()?;
        let selected = self.list.selection().ids();
        let result = bulk::dispatch(self.kind, action, &selected, self.list.records(), ctx);
        let result = match result {
            Ok(BulkOutcome::Completed(mut report)) => {
                self.list.clear_selection();
                if report.refresh {
                    if let Err(e) = self.refresh(ctx.store) {
                        report.refresh_error = Some(e.to_string());
                    }
                }
                Ok(BulkOutcome::Completed(report))
            }
            other => other,
        };
        self.end_dispatch();
        result
    }

    pub fn snapshot(&mut self) -> ViewSnapshot {
        let select_all = self.list.select_all_state();
        let filters = self.list.filters().clone();
        let sort = self.list.sort().cloned();
        let selection = self.list.selection().ids();
        let total_count = self.list.records().len();
        let page = self.list.page_view();
        ViewSnapshot {
            entity: self.kind,
            school_id: self.school_id.clone(),
            items: page.items.into_iter().cloned().collect(),
            page_index: page.page_index,
            page_size: page.page_size,
            total_pages: page.total_pages,
            total_count,
            filtered_count: page.filtered_count,
            filters,
            sort,
            selection,
            select_all,
            bulk: BulkState {
                available: self.kind.bulk_actions(),
                in_flight: self.in_flight,
            },
        }
    }
}
