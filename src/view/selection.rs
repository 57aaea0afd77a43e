use serde::Serialize;
use std::collections::BTreeSet;

/// Tri-state for the "select all" checkbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectAllState {
    None,
    Indeterminate,
    All,
}

/// Selected record IDs. Membership is independent of filtering: IDs that
/// drop out of the visible set stay selected until cleared or toggled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SelectionSet {
    ids: BTreeSet<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether `id` is selected afterwards.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        }
    }

    /// Clears when the selection already equals the visible set, otherwise
    /// replaces it with exactly the visible set.
    pub fn select_all_visible<'a, I>(&mut self, visible: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let visible: BTreeSet<String> = visible.into_iter().map(str::to_string).collect();
        if !visible.is_empty() && self.ids == visible {
            self.ids.clear();
        } else {
            self.ids = visible;
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }

    pub fn select_all_state<'a, I>(&self, visible: I) -> SelectAllState
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut visible_count = 0usize;
        let mut selected_visible = 0usize;
        for id in visible {
            visible_count += 1;
            if self.contains(id) {
                selected_visible += 1;
            }
        }
        if selected_visible == 0 {
            SelectAllState::None
        } else if selected_visible == visible_count && self.ids.len() == visible_count {
            SelectAllState::All
        } else {
            SelectAllState::Indeterminate
        }
    }
}
