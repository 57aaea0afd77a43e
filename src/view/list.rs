//! Page-level list state: filters and sort feed a memoized derived view, which
//! feeds pagination and the select-all checkbox.

use crate::records::Record;
use crate::view::filter::{find_def, matches, FilterDef, FilterSpec};
use crate::view::paging::{clamp_page, window_of, PageWindow, MAX_PAGE_SIZE};
use crate::view::selection::{SelectAllState, SelectionSet};
use crate::view::sort::{sort_indices, SortConfig, SortDirection};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ListError {
    #[error("unknown filter key: {0}")]
    UnknownFilter(String),
}

#[derive(Debug)]
pub struct PageView<'a, R> {
    pub items: Vec<&'a R>,
    pub page_index: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub filtered_count: usize,
}

pub struct ListSession<R> {
    records: Vec<R>,
    defs: &'static [FilterDef],
    filters: FilterSpec,
    sort: Option<SortConfig>,
    page: PageWindow,
    selection: SelectionSet,
    derived: Option<Vec<usize>>,
}

impl<R: Record> ListSession<R> {
    pub fn new(records: Vec<R>, defs: &'static [FilterDef], page_size: usize) -> Self {
        Self {
            records,
            defs,
            filters: FilterSpec::new(),
            sort: None,
            page: PageWindow::first(page_size),
            selection: SelectionSet::new(),
            derived: None,
        }
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn filters(&self) -> &FilterSpec {
        &self.filters
    }

    pub fn sort(&self) -> Option<&SortConfig> {
        self.sort.as_ref()
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    /// Swaps in a freshly fetched record set. Filters, sort and selection survive.
    pub fn replace_records(&mut self, records: Vec<R>) {
        self.records = records;
        self.derived = None;
    }

    pub fn set_filter(&mut self, key: &str, value: &str) -> Result<(), ListError> {
        if find_def(self.defs, key).is_none() {
            return Err(ListError::UnknownFilter(key.to_string()));
        }
        self.filters.set(key, value);
        self.derived = None;
        self.page.page_index = 1;
        Ok(())
    }

    pub fn reset_filters(&mut self) {
        self.filters.reset();
        self.derived = None;
        self.page.page_index = 1;
    }

    /// With no explicit direction, re-sorting by the active key flips it and a
    /// new key starts at `default_direction`.
    pub fn set_sort(
        &mut self,
        key: &str,
        direction: Option<SortDirection>,
        default_direction: SortDirection,
    ) {
        let direction = match (direction, self.sort.as_ref()) {
            (Some(d), _) => d,
            (None, Some(current)) if current.key == key => current.direction.flipped(),
            (None, _) => default_direction,
        };
        self.sort = Some(SortConfig::new(key, direction));
        self.derived = None;
        self.page.page_index = 1;
    }

    pub fn clear_sort(&mut self) {
        self.sort = None;
        self.derived = None;
        self.page.page_index = 1;
    }

    pub fn set_page(&mut self, page_index: usize) {
        let count = self.ordered().len();
        self.page.page_index = clamp_page(page_index, count, self.page.page_size);
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page = PageWindow::first(page_size.clamp(1, MAX_PAGE_SIZE));
    }

    /// Filtered then sorted indices into the record set, recomputed only
    /// after an input changed.
    pub fn ordered(&mut self) -> &[usize] {
        if self.derived.is_none() {
            let mut idx: Vec<usize> = self
                .records
                .iter()
                .enumerate()
                .filter(|(_, r)| matches(*r, &self.filters, self.defs))
                .map(|(i, _)| i)
                .collect();
            if let Some(sort) = &self.sort {
                sort_indices(&self.records, &mut idx, sort);
            }
            self.derived = Some(idx);
        }
        self.derived.as_deref().unwrap_or_default()
    }

    pub fn visible_ids(&mut self) -> Vec<String> {
        self.ordered();
        let idx = self.derived.as_deref().unwrap_or_default();
        idx.iter().map(|&i| self.records[i].id().to_string()).collect()
    }

    pub fn page_view(&mut self) -> PageView<'_, R> {
        self.ordered();
        let idx = self.derived.as_deref().unwrap_or_default();
        let window = window_of(idx, self.page.page_index, self.page.page_size);
        self.page.page_index = window.page_index;
        PageView {
            items: window.items.iter().map(|&i| &self.records[i]).collect(),
            page_index: window.page_index,
            page_size: self.page.page_size,
            total_pages: window.total_pages,
            filtered_count: idx.len(),
        }
    }

    /// Whether `id` names a fetched record, filtered out or not.
    pub fn has_record(&self, id: &str) -> bool {
        self.records.iter().any(|r| r.id() == id)
    }

    pub fn toggle(&mut self, id: &str) -> bool {
        self.selection.toggle(id)
    }

    /// Select-all works on the whole filtered set, not only the current page.
    pub fn toggle_all(&mut self) {
        let visible = self.visible_ids();
        self.selection
            .select_all_visible(visible.iter().map(String::as_str));
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn select_all_state(&mut self) -> SelectAllState {
        let visible = self.visible_ids();
        self.selection
            .select_all_state(visible.iter().map(String::as_str))
    }
}
