use serde::Serialize;

pub const MAX_PAGE_SIZE: usize = 200;

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageWindow {
    pub page_index: usize,
    pub page_size: usize,
}

impl PageWindow {
    pub fn first(page_size: usize) -> Self {
        Self {
            page_index: 1,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct PageSlice<'a, T> {
    pub items: &'a [T],
    pub page_index: usize,
    pub total_pages: usize,
}

/// An empty list still has one (empty) page.
pub fn total_pages(count: usize, page_size: usize) -> usize {
    let size = page_size.max(1);
    count.div_ceil(size).max(1)
}

pub fn clamp_page(page_index: usize, count: usize, page_size: usize) -> usize {
    page_index.clamp(1, total_pages(count, page_size))
}

pub fn window_of<T>(ordered: &[T], page_index: usize, page_size: usize) -> PageSlice<'_, T> {
    let size = page_size.max(1);
    let total = total_pages(ordered.len(), size);
    let page = page_index.clamp(1, total);
    let start = ((page - 1) * size).min(ordered.len());
    let end = (start + size).min(ordered.len());
    PageSlice {
        items: &ordered[start..end],
        page_index: page,
        total_pages: total,
    }
}
